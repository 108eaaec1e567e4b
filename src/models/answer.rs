// src/models/answer.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'answers' table in the database.
///
/// One immutable row per accepted submission; never updated or deleted.
/// `data` is a JSON array of [`ResultItem`] pairs.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnswerRecord {
    pub id: i64,
    pub survey_id: i64,

    /// Submitter, when the survey required login. Anonymous otherwise.
    pub user_id: Option<i64>,

    pub data: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One (question, answer) pair of a submission. The answer is always a
/// string; multi-select values are comma-joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub question_id: String,
    pub answer: String,
}

/// DTO for submitting a survey.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequest {
    #[validate(range(min = 1))]
    pub id: i64,
    #[validate(length(min = 1, message = "No answers submitted."))]
    pub result: Vec<ResultItem>,
}
