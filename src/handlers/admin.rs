// src/handlers/admin.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::survey::{
        CreateSurveyRequest, SurveyListItem, SurveyStatus, SurveyType, UpdateSurveyRequest,
    },
    state::AppState,
    stats::{seed_counters, seeds_for_schema, seeds_for_update},
    utils::jwt::Claims,
};

use super::fetch_owned_survey;

/// Creates a survey: normalizes the schema, persists the row and seeds one
/// zero-valued counter per option of every option question, atomically.
pub async fn create_survey(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.survey_type != SurveyType::Survey as i16
        && payload.survey_type != SurveyType::Vote as i16
    {
        return Err(AppError::BadRequest("Unknown survey type".to_string()));
    }

    let mut schema = payload.schema;
    schema.normalize_and_verify().inspect_err(|e| {
        tracing::warn!("Schema rejected: {}", e);
    })?;

    let schema_str = serde_json::to_string(&schema)?;
    let path = Uuid::new_v4().to_string();

    let mut tx = state.pool.begin().await?;

    let survey_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO surveys (admin_id, title, survey_type, path, schema, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(claims.user_id())
    .bind(&schema.banner_conf.title_conf.main_title)
    .bind(payload.survey_type)
    .bind(&path)
    .bind(&schema_str)
    .bind(SurveyStatus::Unpublished as i16)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create survey: {:?}", e);
        AppError::from(e)
    })?;

    let seeds = seeds_for_schema(survey_id, &schema);
    if !seeds.is_empty() {
        seed_counters(&mut tx, &seeds).await?;
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit survey creation: {:?}", e);
        AppError::from(e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": survey_id, "path": path })),
    ))
}

/// Replaces a survey's schema wholesale.
///
/// The new revision is diffed against the stored one: category changes are
/// rejected, newly added options get counters seeded. Existing counters are
/// never re-seeded or deleted. The cache entry is dropped after commit.
pub async fn update_survey(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut schema = payload.schema;
    schema.normalize_and_verify().inspect_err(|e| {
        tracing::warn!("Schema rejected: {}", e);
    })?;

    let survey = fetch_owned_survey(&state.pool, &claims, id).await?;

    let old_schema = survey.parse_schema().map_err(|e| {
        tracing::error!("Corrupt survey schema id:{} error:{:?}", survey.id, e);
        AppError::from(e)
    })?;

    let seeds = seeds_for_update(survey.id, &old_schema, &schema)?;
    let schema_str = serde_json::to_string(&schema)?;

    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE surveys SET title = $1, schema = $2, updated_at = now() WHERE id = $3")
        .bind(&schema.banner_conf.title_conf.main_title)
        .bind(&schema_str)
        .bind(survey.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update survey: {:?}", e);
            AppError::from(e)
        })?;

    if !seeds.is_empty() {
        seed_counters(&mut tx, &seeds).await?;
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit survey update: {:?}", e);
        AppError::from(e)
    })?;

    // Synchronous invalidation after commit; the TTL bounds staleness if
    // this fails.
    if let Err(e) = state.cache.delete(&survey.path).await {
        tracing::error!("Failed to invalidate survey cache: {}", e);
    }

    Ok(Json(json!({ "message": "Survey updated" })))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    #[serde(rename = "type")]
    pub survey_type: Option<i16>,
    pub status: Option<i16>,
    pub keyword: Option<String>,
}

/// Paginated survey listing. Non-super admins only see their own surveys.
pub async fn list_surveys(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);

    let admin_id = (!claims.is_super()).then(|| claims.user_id());
    let keyword = params.keyword.filter(|k| !k.is_empty()).map(|k| format!("%{k}%"));

    let list = sqlx::query_as::<_, SurveyListItem>(
        r#"
        SELECT s.id, u.username AS admin, s.title, s.survey_type, s.path, s.status,
               s.created_at, s.updated_at
        FROM surveys s
        JOIN users u ON u.id = s.admin_id
        WHERE ($1::BIGINT IS NULL OR s.admin_id = $1)
          AND ($2::SMALLINT IS NULL OR s.survey_type = $2)
          AND ($3::SMALLINT IS NULL OR s.status = $3)
          AND ($4::TEXT IS NULL OR s.title ILIKE $4)
        ORDER BY s.id DESC
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(admin_id)
    .bind(params.survey_type)
    .bind(params.status)
    .bind(&keyword)
    .bind(page_size)
    .bind((page - 1) * page_size)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list surveys: {:?}", e);
        AppError::from(e)
    })?;

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM surveys s
        WHERE ($1::BIGINT IS NULL OR s.admin_id = $1)
          AND ($2::SMALLINT IS NULL OR s.survey_type = $2)
          AND ($3::SMALLINT IS NULL OR s.status = $3)
          AND ($4::TEXT IS NULL OR s.title ILIKE $4)
        "#,
    )
    .bind(admin_id)
    .bind(params.survey_type)
    .bind(params.status)
    .bind(&keyword)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to count surveys: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({
        "page": page,
        "page_size": page_size,
        "list": list,
        "total": total,
    })))
}

/// Admin-facing survey detail, straight from the backing store.
pub async fn get_survey(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = fetch_owned_survey(&state.pool, &claims, id).await?;

    let schema = survey.parse_schema().map_err(|e| {
        tracing::error!("Corrupt survey schema id:{} error:{:?}", survey.id, e);
        AppError::from(e)
    })?;

    Ok(Json(json!({
        "id": survey.id,
        "type": survey.survey_type,
        "path": survey.path,
        "schema": schema,
        "status": survey.status,
        "created_at": survey.created_at,
        "updated_at": survey.updated_at,
    })))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: i16,
}

/// Publishes or unpublishes a survey.
pub async fn set_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<StatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.status != SurveyStatus::Unpublished as i16
        && payload.status != SurveyStatus::Published as i16
    {
        return Err(AppError::BadRequest("Unknown survey status".to_string()));
    }

    let survey = fetch_owned_survey(&state.pool, &claims, id).await?;

    sqlx::query("UPDATE surveys SET status = $1, updated_at = now() WHERE id = $2")
        .bind(payload.status)
        .bind(survey.id)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update survey status: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(json!({ "message": "Survey status updated" })))
}

/// Deletes a survey row and drops its cache entry. Answer records and stat
/// counters are retained for historical reporting.
pub async fn delete_survey(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = fetch_owned_survey(&state.pool, &claims, id).await?;

    sqlx::query("DELETE FROM surveys WHERE id = $1")
        .bind(survey.id)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete survey: {:?}", e);
            AppError::from(e)
        })?;

    if let Err(e) = state.cache.delete(&survey.path).await {
        tracing::error!("Failed to invalidate survey cache: {}", e);
    }

    Ok(Json(json!({ "message": "Survey deleted" })))
}
