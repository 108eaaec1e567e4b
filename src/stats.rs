// src/stats.rs

use std::collections::{HashMap, HashSet};

use sqlx::{Postgres, QueryBuilder, Transaction};

use crate::{
    error::AppError,
    schema::{SurveySchema, validate::StatIncrement},
};

/// Counter rows are inserted in chunks of this size.
const SEED_BATCH_SIZE: usize = 100;

/// Identity of one (survey, question, option) counter row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatKey {
    pub survey_id: i64,
    pub question_id: String,
    pub option_id: String,
}

/// Zero-valued counters to create alongside a brand new schema: one per
/// option of every option-category question.
pub fn seeds_for_schema(survey_id: i64, schema: &SurveySchema) -> Vec<StatKey> {
    let mut seeds = Vec::new();
    for item in &schema.question_conf.items {
        if let Some(conf) = item.choice_conf() {
            for opt in &conf.options {
                seeds.push(StatKey {
                    survey_id,
                    question_id: item.id.clone(),
                    option_id: opt.id.clone(),
                });
            }
        }
    }
    seeds
}

/// Diffs an updated schema against the prior revision.
///
/// A question id present in both revisions must keep its category; narrower
/// changes within a category are permitted. A wholly new option-category
/// question seeds all its options; a surviving one seeds only options that
/// did not exist before. Existing rows are never re-seeded or deleted, so
/// counters for removed options stay behind as orphans.
pub fn seeds_for_update(
    survey_id: i64,
    old: &SurveySchema,
    new: &SurveySchema,
) -> Result<Vec<StatKey>, AppError> {
    let old_items: HashMap<&str, &crate::schema::QuestionItem> = old
        .question_conf
        .items
        .iter()
        .map(|item| (item.id.as_str(), item))
        .collect();

    let mut seeds = Vec::new();
    for item in &new.question_conf.items {
        match old_items.get(item.id.as_str()) {
            Some(old_item) => {
                if item.category() != old_item.category() {
                    tracing::warn!(
                        "Incompatible question type change id:{} ({} -> {})",
                        item.id,
                        old_item.category().as_str(),
                        item.category().as_str()
                    );
                    return Err(AppError::SchemaInvalid(format!(
                        "question(id={}): category change from {} to {} is not allowed",
                        item.id,
                        old_item.category().as_str(),
                        item.category().as_str()
                    )));
                }

                if let (Some(conf), Some(old_conf)) = (item.choice_conf(), old_item.choice_conf())
                {
                    let existing: HashSet<&str> =
                        old_conf.options.iter().map(|o| o.id.as_str()).collect();
                    for opt in &conf.options {
                        if !existing.contains(opt.id.as_str()) {
                            seeds.push(StatKey {
                                survey_id,
                                question_id: item.id.clone(),
                                option_id: opt.id.clone(),
                            });
                        }
                    }
                }
            }
            None => {
                if let Some(conf) = item.choice_conf() {
                    for opt in &conf.options {
                        seeds.push(StatKey {
                            survey_id,
                            question_id: item.id.clone(),
                            option_id: opt.id.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(seeds)
}

/// Inserts zero-valued counter rows inside the caller's transaction.
pub async fn seed_counters(
    tx: &mut Transaction<'_, Postgres>,
    seeds: &[StatKey],
) -> Result<(), AppError> {
    for chunk in seeds.chunks(SEED_BATCH_SIZE) {
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO stats (survey_id, question_id, option_id, count) ",
        );
        builder.push_values(chunk, |mut b, seed| {
            b.push_bind(seed.survey_id)
                .push_bind(&seed.question_id)
                .push_bind(&seed.option_id)
                .push_bind(0i64);
        });
        builder.build().execute(&mut **tx).await?;
    }
    Ok(())
}

/// Applies an accepted submission's increment batch inside the caller's
/// transaction.
///
/// The batch is sorted by (question_id, option_id) before the first row lock
/// is acquired. Every concurrently committing submission takes its row locks
/// in this same relative order, so circular wait between overlapping batches
/// cannot occur.
///
/// Counter rows are seeded at schema save time; an increment that matches no
/// row is a logic error and aborts the transaction.
pub async fn apply_increments(
    tx: &mut Transaction<'_, Postgres>,
    survey_id: i64,
    mut increments: Vec<StatIncrement>,
) -> Result<(), AppError> {
    increments.sort();

    for inc in &increments {
        let result = sqlx::query(
            "UPDATE stats SET count = count + 1 \
             WHERE survey_id = $1 AND question_id = $2 AND option_id = $3",
        )
        .bind(survey_id)
        .bind(&inc.question_id)
        .bind(&inc.option_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::StorageError(format!(
                "stat counter missing (survey={} question={} option={})",
                survey_id, inc.question_id, inc.option_id
            )));
        }
    }

    Ok(())
}

/// Competition ranking over option counts, in the input's order.
///
/// Equal counts share a rank; the next distinct lower count ranks one past
/// the number of options strictly ahead of it: [10, 10, 7] -> [1, 1, 3].
pub fn competition_ranks(counts: &[i64]) -> Vec<i64> {
    let mut sorted = counts.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));

    let mut first_rank: HashMap<i64, i64> = HashMap::new();
    for (i, count) in sorted.iter().enumerate() {
        first_rank.entry(*count).or_insert(i as i64 + 1);
    }

    counts.iter().map(|count| first_rank[count]).collect()
}
