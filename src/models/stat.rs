// src/models/stat.rs

use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'stats' table in the database: one monotonically
/// increasing counter per (survey, question, option).
///
/// Rows are seeded before any increment targets them and are never deleted;
/// a row whose option disappeared from a later schema revision is an
/// orphaned counter, still reported.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatRow {
    pub survey_id: i64,
    pub question_id: String,
    pub option_id: String,
    pub count: i64,
}
