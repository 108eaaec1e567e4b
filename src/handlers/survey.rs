// src/handlers/survey.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::{Duration, Local, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        answer::SubmitRequest,
        survey::{Survey, SurveyStatus},
    },
    schema::{SurveySchema, validate::validate_submission},
    state::AppState,
    stats::competition_ranks,
    utils::jwt::{Claims, MaybeClaims},
};

#[derive(Debug, Deserialize)]
pub struct DetailParams {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub id: i64,
    #[serde(rename = "type")]
    pub survey_type: i16,
    pub schema: SurveySchema,
    pub stats: Vec<QuestionStats>,
}

#[derive(Debug, Serialize)]
pub struct QuestionStats {
    pub id: String,
    pub options: Vec<OptionStat>,
}

#[derive(Debug, Serialize)]
pub struct OptionStat {
    pub id: String,
    pub count: i64,
    /// Competition rank; 0 when the question does not request ranking.
    pub rank: i64,
}

/// Public survey detail, served cache-aside.
///
/// Cache hit returns immediately; concurrent misses for one path collapse
/// into a single backing-store fetch whose initiator repopulates the cache.
/// Any cache failure is logged and degrades to a miss.
pub async fn detail(
    State(state): State<AppState>,
    Extension(identity): Extension<MaybeClaims>,
    Query(params): Query<DetailParams>,
) -> Result<impl IntoResponse, AppError> {
    let cached = match state.cache.get(&params.path).await {
        Ok(cached) => cached,
        Err(e) => {
            tracing::error!("Failed to query survey cache: {}", e);
            None
        }
    };

    let survey = match cached {
        Some(survey) => survey,
        None => {
            let pool = state.pool.clone();
            let cache = state.cache.clone();
            let path = params.path.clone();
            state
                .flights
                .run(&params.path, || async move {
                    let record = Survey::find_by_path(&pool, &path)
                        .await
                        .map_err(|e| {
                            tracing::error!("Failed to fetch survey: {:?}", e);
                            AppError::from(e)
                        })?
                        .ok_or(AppError::NotFound("Survey not found".to_string()))?;

                    if let Err(e) = cache.set(&path, &record).await {
                        tracing::error!("Failed to populate survey cache: {}", e);
                    }

                    Ok(record)
                })
                .await?
        }
    };

    let schema = survey.parse_schema().map_err(|e| {
        tracing::error!("Corrupt survey schema id:{} error:{:?}", survey.id, e);
        AppError::from(e)
    })?;

    let stats = vote_stats(&state.pool, &survey, &schema, identity.0.as_ref()).await;

    Ok(Json(DetailResponse {
        id: survey.id,
        survey_type: survey.survey_type,
        schema,
        stats,
    }))
}

/// Builds the public statistics block: vote questions with `show_stats`,
/// filtered by the submitted-first gate, ranked where requested.
///
/// Statistics are decorative on this view; storage failures here degrade to
/// an empty block instead of failing the whole read.
async fn vote_stats(
    pool: &PgPool,
    survey: &Survey,
    schema: &SurveySchema,
    claims: Option<&Claims>,
) -> Vec<QuestionStats> {
    let vote_questions: Vec<_> = schema
        .question_conf
        .items
        .iter()
        .filter(|item| item.is_vote())
        .filter(|item| item.choice_conf().is_some_and(|c| c.show_stats))
        .collect();

    if vote_questions.is_empty() {
        return Vec::new();
    }

    // Some questions only reveal counts to callers who already submitted.
    let needs_submit = vote_questions
        .iter()
        .any(|item| item.choice_conf().is_some_and(|c| c.show_stats_after_submit));
    let mut has_submitted = false;
    if needs_submit {
        if let Some(claims) = claims {
            let count = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM answers WHERE survey_id = $1 AND user_id = $2",
            )
            .bind(survey.id)
            .bind(claims.user_id())
            .fetch_one(pool)
            .await
            .unwrap_or(0);
            has_submitted = count > 0;
        }
    }

    let visible: Vec<_> = vote_questions
        .into_iter()
        .filter(|item| {
            item.choice_conf()
                .is_some_and(|c| !c.show_stats_after_submit || has_submitted)
        })
        .collect();

    if visible.is_empty() {
        return Vec::new();
    }

    let rows = sqlx::query_as::<_, crate::models::stat::StatRow>(
        "SELECT survey_id, question_id, option_id, count FROM stats WHERE survey_id = $1",
    )
    .bind(survey.id)
    .fetch_all(pool)
    .await
    .unwrap_or_else(|e| {
        tracing::error!("Failed to fetch stats: {:?}", e);
        Vec::new()
    });

    let mut counts: HashMap<&str, HashMap<&str, i64>> = HashMap::new();
    for row in &rows {
        counts
            .entry(row.question_id.as_str())
            .or_default()
            .insert(row.option_id.as_str(), row.count);
    }

    visible
        .into_iter()
        .filter_map(|item| {
            let conf = item.choice_conf()?;
            let question_counts = counts.get(item.id.as_str());

            let mut options: Vec<OptionStat> = conf
                .options
                .iter()
                .map(|opt| OptionStat {
                    id: opt.id.clone(),
                    count: question_counts
                        .and_then(|m| m.get(opt.id.as_str()).copied())
                        .unwrap_or(0),
                    rank: 0,
                })
                .collect();

            if conf.show_rank {
                let all_counts: Vec<i64> = options.iter().map(|o| o.count).collect();
                for (opt, rank) in options.iter_mut().zip(competition_ranks(&all_counts)) {
                    opt.rank = rank;
                }
            }

            Some(QuestionStats {
                id: item.id.clone(),
                options,
            })
        })
        .collect()
}

/// Accepts one submission: policy checks, answer validation, then the answer
/// record and its counter increments commit in a single transaction.
pub async fn submit(
    State(state): State<AppState>,
    Extension(identity): Extension<MaybeClaims>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let survey = Survey::find_by_id(&state.pool, payload.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch survey: {:?}", e);
            AppError::from(e)
        })?
        .ok_or(AppError::NotFound("Survey not found".to_string()))?;

    // Unpublished surveys are indistinguishable from absent ones.
    if survey.status != SurveyStatus::Published as i16 {
        return Err(AppError::NotFound("Survey not found".to_string()));
    }

    let schema = survey.parse_schema().map_err(|e| {
        tracing::error!("Corrupt survey schema id:{} error:{:?}", survey.id, e);
        AppError::from(e)
    })?;

    let now = Local::now();
    let now_naive = now.naive_local();
    if now_naive < schema.base_conf.begin_time || now_naive > schema.base_conf.end_time {
        return Err(AppError::ValidationFailed(
            "Survey is outside its availability window".to_string(),
        ));
    }

    let mut user_id: Option<i64> = None;
    if schema.base_conf.is_login_required {
        let Some(claims) = &identity.0 else {
            return Err(AppError::AuthError("Login required".to_string()));
        };

        if !schema.base_conf.allowed_user_type.is_empty()
            && !schema.base_conf.allowed_user_type.contains(&claims.role)
        {
            return Err(AppError::PermissionDenied(
                "Role is not allowed to submit".to_string(),
            ));
        }

        let uid = claims.user_id();

        if schema.base_conf.total_limit > 0 {
            let total = count_submissions(&state.pool, survey.id, uid, None).await?;
            if total >= schema.base_conf.total_limit {
                return Err(AppError::ValidationFailed(
                    "Submission limit reached".to_string(),
                ));
            }
        }

        if schema.base_conf.daily_limit > 0 {
            let day_start = now.with_time(NaiveTime::MIN).single().unwrap_or(now);
            let day_end = day_start + Duration::hours(24);
            let today = count_submissions(
                &state.pool,
                survey.id,
                uid,
                Some((day_start.with_timezone(&Utc), day_end.with_timezone(&Utc))),
            )
            .await?;
            if today >= schema.base_conf.daily_limit {
                return Err(AppError::ValidationFailed(
                    "Daily submission limit reached".to_string(),
                ));
            }
        }

        user_id = Some(uid);
    }

    let answers: HashMap<String, String> = payload
        .result
        .iter()
        .map(|item| (item.question_id.clone(), item.answer.clone()))
        .collect();

    let increments = validate_submission(&schema, &answers)?;

    let data = serde_json::to_string(&payload.result)?;

    // Answer record and counter increments commit together or not at all.
    let mut tx = state.pool.begin().await?;

    sqlx::query("INSERT INTO answers (survey_id, user_id, data) VALUES ($1, $2, $3)")
        .bind(survey.id)
        .bind(user_id)
        .bind(&data)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create answer record: {:?}", e);
            AppError::from(e)
        })?;

    if !increments.is_empty() {
        crate::stats::apply_increments(&mut tx, survey.id, increments).await?;
    }

    tx.commit().await.map_err(|e| {
        tracing::error!("Failed to commit submission: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(json!({
        "message": "Submission accepted"
    })))
}

async fn count_submissions(
    pool: &PgPool,
    survey_id: i64,
    user_id: i64,
    range: Option<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)>,
) -> Result<i64, AppError> {
    let count = match range {
        Some((start, end)) => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM answers \
                 WHERE survey_id = $1 AND user_id = $2 AND created_at >= $3 AND created_at < $4",
            )
            .bind(survey_id)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_one(pool)
            .await
        }
        None => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM answers WHERE survey_id = $1 AND user_id = $2",
            )
            .bind(survey_id)
            .bind(user_id)
            .fetch_one(pool)
            .await
        }
    }
    .map_err(|e| {
        tracing::error!("Failed to count submissions: {:?}", e);
        AppError::from(e)
    })?;

    Ok(count)
}
