// src/handlers/results.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::AppError,
    models::{answer::AnswerRecord, stat::StatRow},
    state::AppState,
    utils::jwt::Claims,
};

use super::fetch_owned_survey;

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub survey_id: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsItem {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub options: Vec<StatsOption>,
}

#[derive(Debug, Serialize)]
pub struct StatsOption {
    pub id: String,
    pub text: String,
    pub count: i64,
}

/// Per-option counters for every option-category question of a survey.
///
/// Counters whose option disappeared from the current schema revision are
/// still reported, labeled as referring to a deleted option.
pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<StatsParams>,
) -> Result<impl IntoResponse, AppError> {
    let survey = fetch_owned_survey(&state.pool, &claims, params.survey_id).await?;

    let schema = survey.parse_schema().map_err(|e| {
        tracing::error!("Corrupt survey schema id:{} error:{:?}", survey.id, e);
        AppError::from(e)
    })?;

    let rows = sqlx::query_as::<_, StatRow>(
        "SELECT survey_id, question_id, option_id, count FROM stats WHERE survey_id = $1",
    )
    .bind(survey.id)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch stats: {:?}", e);
        AppError::from(e)
    })?;

    let submit_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM answers WHERE survey_id = $1",
    )
    .bind(survey.id)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to count submissions: {:?}", e);
        AppError::from(e)
    })?;

    let mut counts: HashMap<&str, HashMap<&str, i64>> = HashMap::new();
    for row in &rows {
        counts
            .entry(row.question_id.as_str())
            .or_default()
            .insert(row.option_id.as_str(), row.count);
    }

    let list: Vec<StatsItem> = schema
        .question_conf
        .items
        .iter()
        .filter_map(|item| {
            let conf = item.choice_conf()?;
            let question_counts = counts.get(item.id.as_str());

            let mut options: Vec<StatsOption> = conf
                .options
                .iter()
                .map(|opt| StatsOption {
                    id: opt.id.clone(),
                    text: opt.text.clone(),
                    count: question_counts
                        .and_then(|m| m.get(opt.id.as_str()).copied())
                        .unwrap_or(0),
                })
                .collect();

            // Orphaned counters: rows whose option is gone from this revision.
            if let Some(question_counts) = question_counts {
                let mut orphans: Vec<&str> = question_counts
                    .keys()
                    .filter(|opt_id| !conf.options.iter().any(|o| o.id == **opt_id))
                    .copied()
                    .collect();
                orphans.sort_unstable();
                for opt_id in orphans {
                    options.push(StatsOption {
                        id: opt_id.to_string(),
                        text: format!("Deleted option ({opt_id})"),
                        count: question_counts[opt_id],
                    });
                }
            }

            Some(StatsItem {
                id: item.id.clone(),
                title: item.title.clone(),
                question_type: question_type_tag(item),
                options,
            })
        })
        .collect();

    Ok(Json(json!({
        "list": list,
        "submit_count": submit_count,
    })))
}

fn question_type_tag(item: &crate::schema::QuestionItem) -> String {
    use crate::schema::QuestionKind;
    match &item.kind {
        QuestionKind::Text(_) => "text",
        QuestionKind::Textarea(_) => "textarea",
        QuestionKind::Radio(_) => "radio",
        QuestionKind::Checkbox(_) => "checkbox",
        QuestionKind::VoteRadio(_) => "vote-radio",
        QuestionKind::VoteCheckbox(_) => "vote-checkbox",
        QuestionKind::Upload(_) => "upload",
    }
    .to_string()
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub survey_id: i64,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Paginated raw answer records for one survey, newest first.
pub async fn list_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let survey = fetch_owned_survey(&state.pool, &claims, params.survey_id).await?;

    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);

    let list = sqlx::query_as::<_, AnswerRecord>(
        "SELECT id, survey_id, user_id, data, created_at FROM answers \
         WHERE survey_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3",
    )
    .bind(survey.id)
    .bind(page_size)
    .bind((page - 1) * page_size)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list answers: {:?}", e);
        AppError::from(e)
    })?;

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM answers WHERE survey_id = $1",
    )
    .bind(survey.id)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to count answers: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({
        "page": page,
        "page_size": page_size,
        "list": list,
        "total": total,
    })))
}
