// src/models/survey.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::schema::SurveySchema;

/// Represents the 'surveys' table in the database.
///
/// `schema` holds the UTF-8 JSON encoding of [`SurveySchema`]; it is replaced
/// wholesale on update, never patched. The full row is also what the survey
/// cache stores, keyed by `path`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Survey {
    pub id: i64,

    /// Owning admin.
    pub admin_id: i64,

    /// Denormalized copy of the schema's main title, for listings.
    pub title: String,

    /// 1 = survey, 2 = vote.
    pub survey_type: i16,

    /// Public path identifier (uuid), the external-facing key.
    pub path: String,

    pub schema: String,

    /// 1 = unpublished, 2 = published.
    pub status: i16,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum SurveyType {
    Survey = 1,
    Vote = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum SurveyStatus {
    Unpublished = 1,
    Published = 2,
}

impl Survey {
    const COLUMNS: &'static str =
        "id, admin_id, title, survey_type, path, schema, status, created_at, updated_at";

    pub fn parse_schema(&self) -> Result<SurveySchema, serde_json::Error> {
        serde_json::from_str(&self.schema)
    }

    pub async fn find_by_id(pool: &sqlx::PgPool, id: i64) -> Result<Option<Survey>, sqlx::Error> {
        sqlx::query_as::<_, Survey>(&format!(
            "SELECT {} FROM surveys WHERE id = $1",
            Self::COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_path(
        pool: &sqlx::PgPool,
        path: &str,
    ) -> Result<Option<Survey>, sqlx::Error> {
        sqlx::query_as::<_, Survey>(&format!(
            "SELECT {} FROM surveys WHERE path = $1",
            Self::COLUMNS
        ))
        .bind(path)
        .fetch_optional(pool)
        .await
    }
}

/// DTO for creating a survey.
#[derive(Debug, Deserialize)]
pub struct CreateSurveyRequest {
    /// 1 = survey, 2 = vote.
    #[serde(rename = "type")]
    pub survey_type: i16,
    pub schema: SurveySchema,
}

/// DTO for a wholesale schema replacement.
#[derive(Debug, Deserialize)]
pub struct UpdateSurveyRequest {
    pub schema: SurveySchema,
}

/// Survey listing entry (schema omitted).
#[derive(Debug, Serialize, FromRow)]
pub struct SurveyListItem {
    pub id: i64,
    pub admin: String,
    pub title: String,
    #[serde(rename = "type")]
    pub survey_type: i16,
    pub path: String,
    pub status: i16,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
