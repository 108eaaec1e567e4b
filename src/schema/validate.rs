// src/schema/validate.rs

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::error::AppError;

use super::{ChoiceConf, InputConf, QuestionItem, QuestionKind, SurveySchema, UploadConf,
    UploadKind, ValidRule};

static REGEX_MOBILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1[3-9]\d{9}$").unwrap());
static REGEX_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+([-+.]\w+)*@\w+([-.]\w+)*\.\w+([-.]\w+)*$").unwrap());
static REGEX_ID_CARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^\d{15}$)|(^\d{18}$)|(^\d{17}(\d|X|x)$)").unwrap());

/// Fixed allow-list for the image upload sub-type.
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// One pending `count + 1` against a (question, option) counter.
///
/// Field order matters: the derived `Ord` gives the (question_id, option_id)
/// total order the aggregator sorts increment batches by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatIncrement {
    pub question_id: String,
    pub option_id: String,
}

/// Checks one submitted answer set against one normalized schema.
///
/// `answers` maps question id to raw answer string; absent entries mean
/// "unanswered"; multi-select answers are comma-joined. The decision is
/// all-or-nothing: the first failing question rejects the whole submission.
/// On acceptance, returns the counter increments the submission implies.
pub fn validate_submission(
    schema: &SurveySchema,
    answers: &HashMap<String, String>,
) -> Result<Vec<StatIncrement>, AppError> {
    let mut increments = Vec::new();

    for item in &schema.question_conf.items {
        let answer = answers.get(&item.id).map(String::as_str).unwrap_or_default();

        // The required check precedes category dispatch.
        if item.is_required && answer.is_empty() {
            tracing::warn!("Required question not answered id:{}", item.id);
            return Err(AppError::ValidationFailed(format!(
                "required question not answered (id={})",
                item.id
            )));
        }

        if answer.is_empty() {
            continue;
        }

        match &item.kind {
            QuestionKind::Radio(conf)
            | QuestionKind::Checkbox(conf)
            | QuestionKind::VoteRadio(conf)
            | QuestionKind::VoteCheckbox(conf) => {
                validate_choice(item, conf, answer, answers, &mut increments)?
            }
            QuestionKind::Text(conf) | QuestionKind::Textarea(conf) => {
                validate_input(item, conf, answer)?
            }
            QuestionKind::Upload(conf) => validate_upload(item, conf, answer)?,
        }
    }

    Ok(increments)
}

fn validate_choice(
    item: &QuestionItem,
    conf: &ChoiceConf,
    answer: &str,
    answers: &HashMap<String, String>,
    increments: &mut Vec<StatIncrement>,
) -> Result<(), AppError> {
    let selected: Vec<&str> = answer.split(',').collect();

    // Selection count bounds apply to checkbox flavors only.
    if item.is_checkbox() {
        let n = selected.len();
        if (conf.min_num > 0 && n < conf.min_num as usize)
            || (conf.max_num > 0 && n > conf.max_num as usize)
        {
            tracing::warn!("Selection count out of bounds id:{}", item.id);
            return Err(AppError::ValidationFailed(format!(
                "selection count out of bounds (id={})",
                item.id
            )));
        }
    }

    for opt_id in selected {
        let Some(opt) = conf.options.iter().find(|o| o.id == opt_id) else {
            tracing::warn!("Unknown option id:{} option:{}", item.id, opt_id);
            return Err(AppError::ValidationFailed(format!(
                "unknown option (id={} option={})",
                item.id, opt_id
            )));
        };

        increments.push(StatIncrement {
            question_id: item.id.clone(),
            option_id: opt.id.clone(),
        });

        // A mandatory free-text companion must arrive under its others-key.
        if opt.others && opt.must_others {
            let companion = answers.get(&opt.others_key).map(String::as_str).unwrap_or_default();
            if companion.is_empty() {
                tracing::warn!("Companion answer missing id:{} option:{}", item.id, opt.id);
                return Err(AppError::ValidationFailed(format!(
                    "companion answer required (id={} option={})",
                    item.id, opt.id
                )));
            }
        }
    }

    Ok(())
}

fn validate_input(item: &QuestionItem, conf: &InputConf, answer: &str) -> Result<(), AppError> {
    match conf.valid {
        ValidRule::Number => {
            let value: Decimal = answer.parse().map_err(|_| {
                tracing::warn!("Malformed number id:{} val:{}", item.id, answer);
                AppError::ValidationFailed(format!("malformed number (id={})", item.id))
            })?;
            if let Some(range) = &conf.number_range {
                if value < range.min || value > range.max {
                    tracing::warn!("Number out of range id:{} val:{}", item.id, answer);
                    return Err(AppError::ValidationFailed(format!(
                        "number out of range (id={})",
                        item.id
                    )));
                }
            }
        }
        ValidRule::Mobile => {
            if !REGEX_MOBILE.is_match(answer) {
                tracing::warn!("Malformed mobile number id:{}", item.id);
                return Err(AppError::ValidationFailed(format!(
                    "malformed mobile number (id={})",
                    item.id
                )));
            }
        }
        ValidRule::Email => {
            if !REGEX_EMAIL.is_match(answer) {
                tracing::warn!("Malformed email id:{}", item.id);
                return Err(AppError::ValidationFailed(format!(
                    "malformed email (id={})",
                    item.id
                )));
            }
        }
        ValidRule::IdCard => {
            if !REGEX_ID_CARD.is_match(answer) {
                tracing::warn!("Malformed id card number id:{}", item.id);
                return Err(AppError::ValidationFailed(format!(
                    "malformed id card number (id={})",
                    item.id
                )));
            }
        }
        ValidRule::Any => {
            if let Some(range) = &conf.text_range {
                // Length bounds are counted in Unicode codepoints.
                let len = answer.chars().count();
                if len < range.min as usize || len > range.max as usize {
                    tracing::warn!("Text length out of range id:{}", item.id);
                    return Err(AppError::ValidationFailed(format!(
                        "text length out of range (id={})",
                        item.id
                    )));
                }
            }
            if !conf.regex.is_empty() {
                // Compile-checked at schema save time; a failure here means the
                // stored schema was tampered with, reject the submission.
                let matched = Regex::new(&conf.regex)
                    .map(|re| re.is_match(answer))
                    .unwrap_or(false);
                if !matched {
                    tracing::warn!("Text does not match pattern id:{}", item.id);
                    return Err(AppError::ValidationFailed(format!(
                        "text does not match pattern (id={})",
                        item.id
                    )));
                }
            }
        }
    }

    Ok(())
}

fn validate_upload(item: &QuestionItem, conf: &UploadConf, answer: &str) -> Result<(), AppError> {
    let files: Vec<&str> = answer.split(',').collect();

    if conf.max_file_num > 0 && files.len() > conf.max_file_num as usize {
        tracing::warn!("Too many files id:{}", item.id);
        return Err(AppError::ValidationFailed(format!(
            "too many files (id={})",
            item.id
        )));
    }

    for file in files {
        let ext = Path::new(file)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match conf.upload_type {
            UploadKind::Image => {
                if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                    tracing::warn!("Disallowed image extension id:{} ext:{}", item.id, ext);
                    return Err(AppError::ValidationFailed(format!(
                        "disallowed image extension (id={} ext={})",
                        item.id, ext
                    )));
                }
            }
            UploadKind::File => {
                if !conf.allowed_file_type.is_empty()
                    && !conf.allowed_file_type.iter().any(|a| a == &ext)
                {
                    tracing::warn!("Disallowed file extension id:{} ext:{}", item.id, ext);
                    return Err(AppError::ValidationFailed(format!(
                        "disallowed file extension (id={} ext={})",
                        item.id, ext
                    )));
                }
            }
        }
    }

    Ok(())
}
