// src/schema/normalize.rs

use std::collections::HashSet;

use regex::Regex;

use crate::error::AppError;

use super::{BaseConf, ChoiceConf, InputConf, Layout, QuestionConf, QuestionItem, QuestionKind,
    SurveySchema, UploadConf, UploadKind, ValidRule};

impl SurveySchema {
    /// Turns an admin-supplied schema into a structurally sound,
    /// persistence-ready form, or rejects it with a path-qualified cause.
    ///
    /// Fields that do not apply to a question's configuration are cleared so
    /// stored data never implies a false shape. Reapplying to already
    /// normalized output changes nothing.
    pub fn normalize_and_verify(&mut self) -> Result<(), AppError> {
        if self.version.is_empty() {
            return Err(AppError::SchemaInvalid("version must not be empty".to_string()));
        }

        self.base_conf
            .verify_and_fix()
            .map_err(|e| AppError::SchemaInvalid(format!("base_conf: {e}")))?;

        self.question_conf.verify_and_fix()?;

        Ok(())
    }
}

impl BaseConf {
    fn verify_and_fix(&mut self) -> Result<(), String> {
        if self.end_time <= self.begin_time {
            return Err("end_time must be after begin_time".to_string());
        }

        if self.daily_limit < 0 || self.total_limit < 0 {
            return Err("submission limits must not be negative".to_string());
        }

        if !self.is_login_required {
            self.daily_limit = 0;
            self.total_limit = 0;
            self.allowed_user_type.clear();
        } else if self.total_limit > 0 && self.total_limit < self.daily_limit {
            return Err("total_limit must not be lower than daily_limit".to_string());
        }

        Ok(())
    }
}

impl QuestionConf {
    fn verify_and_fix(&mut self) -> Result<(), AppError> {
        if self.items.is_empty() {
            return Err(AppError::SchemaInvalid(
                "question_conf: at least one question is required".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for item in &self.items {
            if !ids.insert(item.id.clone()) {
                return Err(AppError::SchemaInvalid(format!(
                    "question_conf: duplicate question id: {}",
                    item.id
                )));
            }
        }

        for item in &mut self.items {
            let id = item.id.clone();
            item.verify_and_fix(&ids)
                .map_err(|e| AppError::SchemaInvalid(format!("question(id={id}): {e}")))?;
        }

        Ok(())
    }
}

impl QuestionItem {
    fn verify_and_fix(&mut self, question_ids: &HashSet<String>) -> Result<(), String> {
        let is_checkbox = self.is_checkbox();
        let is_vote = self.is_vote();

        match &mut self.kind {
            QuestionKind::Text(conf) | QuestionKind::Textarea(conf) => conf.verify_and_fix(),
            QuestionKind::Radio(conf)
            | QuestionKind::Checkbox(conf)
            | QuestionKind::VoteRadio(conf)
            | QuestionKind::VoteCheckbox(conf) => {
                conf.verify_and_fix(is_checkbox, is_vote, question_ids)
            }
            QuestionKind::Upload(conf) => conf.verify_and_fix(),
        }
    }
}

impl InputConf {
    fn verify_and_fix(&mut self) -> Result<(), String> {
        if self.valid != ValidRule::Any {
            self.text_range = None;
            self.regex.clear();
        } else {
            if !self.regex.is_empty() {
                Regex::new(&self.regex).map_err(|e| format!("invalid regex pattern: {e}"))?;
            }
            if let Some(range) = &self.text_range {
                if range.min > range.max {
                    return Err("text_range min must not exceed max".to_string());
                }
            }
        }

        if self.valid != ValidRule::Number {
            self.number_range = None;
        } else if let Some(range) = &self.number_range {
            if range.min > range.max {
                return Err("number_range min must not exceed max".to_string());
            }
        }

        Ok(())
    }
}

impl ChoiceConf {
    fn verify_and_fix(
        &mut self,
        is_checkbox: bool,
        is_vote: bool,
        question_ids: &HashSet<String>,
    ) -> Result<(), String> {
        if self.options.is_empty() {
            return Err("at least one option is required".to_string());
        }

        if is_checkbox {
            if self.max_num > 0 && self.min_num > self.max_num {
                return Err("min_num must not exceed max_num".to_string());
            }
            if self.options.len() < self.min_num as usize {
                return Err("min_num cannot be greater than the number of options".to_string());
            }
            if self.options.len() < self.max_num as usize {
                return Err("max_num cannot be greater than the number of options".to_string());
            }
        } else {
            self.min_num = 0;
            self.max_num = 0;
        }

        if !is_vote {
            self.show_stats = false;
            self.show_stats_after_submit = false;
            self.show_rank = false;
        }

        // Option ids and others-keys live in one namespace: the others-key is
        // the submission key of the companion answer, so it must collide with
        // neither another option id nor a real question id.
        let mut option_ids = HashSet::new();
        for opt in &mut self.options {
            if !option_ids.insert(opt.id.clone()) {
                return Err(format!("duplicate option id: {}", opt.id));
            }

            if !opt.others {
                opt.others_key.clear();
                opt.must_others = false;
                opt.placeholder.clear();
            } else {
                if opt.others_key.is_empty() {
                    return Err(format!("option(id={}): others_key is required", opt.id));
                }
                if question_ids.contains(&opt.others_key) {
                    return Err(format!(
                        "others_key collides with a question id: {}",
                        opt.others_key
                    ));
                }
                if !option_ids.insert(opt.others_key.clone()) {
                    return Err(format!("duplicate option id (others_key): {}", opt.others_key));
                }
            }
        }

        if self.layout.is_none() {
            self.layout = Some(Layout::Vertical);
        }

        Ok(())
    }
}

impl UploadConf {
    fn verify_and_fix(&mut self) -> Result<(), String> {
        // Image uploads use the fixed allow-list; a custom one is meaningless.
        if self.upload_type == UploadKind::Image {
            self.allowed_file_type.clear();
        }

        if !(1..=100).contains(&self.max_file_size) {
            return Err("max_file_size must be between 1 and 100".to_string());
        }
        if !(1..=10).contains(&self.max_file_num) {
            return Err("max_file_num must be between 1 and 10".to_string());
        }

        Ok(())
    }
}
