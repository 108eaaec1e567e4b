// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod results;
pub mod survey;

use crate::{error::AppError, models::survey::Survey, utils::jwt::Claims};

/// Loads a survey and enforces the ownership rule: a non-super admin may
/// only touch surveys they created.
async fn fetch_owned_survey(
    pool: &sqlx::PgPool,
    claims: &Claims,
    id: i64,
) -> Result<Survey, AppError> {
    let survey = Survey::find_by_id(pool, id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch survey: {:?}", e);
            AppError::from(e)
        })?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;

    if survey.admin_id != claims.user_id() && !claims.is_super() {
        return Err(AppError::PermissionDenied(
            "Survey belongs to another admin".to_string(),
        ));
    }

    Ok(survey)
}
