// src/schema/mod.rs

pub mod normalize;
pub mod validate;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Versioned structural and validation definition of a survey's questions.
///
/// Stored as a single JSON document on the survey row and replaced wholesale
/// on update, never patched field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveySchema {
    pub version: String,
    pub base_conf: BaseConf,
    pub question_conf: QuestionConf,
    pub banner_conf: BannerConf,
}

/// Availability window and submission policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConf {
    /// Start of the availability window.
    #[serde(with = "datetime_format")]
    pub begin_time: NaiveDateTime,

    /// End of the availability window. Must be strictly after `begin_time`.
    #[serde(with = "datetime_format")]
    pub end_time: NaiveDateTime,

    /// Whether submitting requires an authenticated identity.
    #[serde(default)]
    pub is_login_required: bool,

    /// Per-user submissions allowed per calendar day. 0 = unlimited.
    /// Only effective when `is_login_required` is set.
    #[serde(default)]
    pub daily_limit: i64,

    /// Per-user submissions allowed in total. 0 = unlimited.
    /// Only effective when `is_login_required` is set.
    #[serde(default)]
    pub total_limit: i64,

    /// Roles allowed to submit. Empty = any authenticated role.
    /// Only effective when `is_login_required` is set.
    #[serde(default)]
    pub allowed_user_type: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionConf {
    pub items: Vec<QuestionItem>,
}

/// One question of the survey. The `kind` payload is flattened so the wire
/// format keeps the original flat shape with a `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionItem {
    /// Unique within the whole schema.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// Question type tag and its category-specific payload.
///
/// The tag set deliberately mirrors the wire values; the coarser
/// {input, option, upload} grouping used for validation dispatch is
/// derived via [`QuestionItem::category`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionKind {
    Text(InputConf),
    Textarea(InputConf),
    Radio(ChoiceConf),
    Checkbox(ChoiceConf),
    VoteRadio(ChoiceConf),
    VoteCheckbox(ChoiceConf),
    Upload(UploadConf),
}

/// The semantic grouping that drives validation dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Input,
    Option,
    Upload,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Input => "input",
            Category::Option => "option",
            Category::Upload => "upload",
        }
    }
}

/// Payload for input questions (text / textarea).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConf {
    #[serde(default)]
    pub placeholder: String,

    /// Content format rule. Defaults to free text.
    #[serde(default)]
    pub valid: ValidRule,

    /// Codepoint length bounds. Effective only when `valid` is `*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_range: Option<TextRange>,

    /// Admin-supplied pattern. Effective only when `valid` is `*`.
    /// Compile-checked at schema save time.
    #[serde(default)]
    pub regex: String,

    /// Inclusive value bounds. Effective only when `valid` is `n`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_range: Option<NumberRange>,
}

/// Format rule tag for input questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidRule {
    /// Free text, optionally bounded by `text_range`/`regex`.
    #[default]
    #[serde(rename = "*")]
    Any,
    /// Arbitrary-precision decimal, optionally bounded by `number_range`.
    #[serde(rename = "n")]
    Number,
    /// Mobile phone number.
    #[serde(rename = "m")]
    Mobile,
    /// Email address.
    #[serde(rename = "e")]
    Email,
    /// National id number.
    #[serde(rename = "idcard")]
    IdCard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberRange {
    pub min: Decimal,
    pub max: Decimal,
}

/// Payload for option questions (radio / checkbox / vote variants).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceConf {
    pub options: Vec<ChoiceOption>,

    /// Display layout. Normalization fills in `vertical` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,

    /// Minimum selections. Effective only for checkbox types. 0 = no bound.
    #[serde(default)]
    pub min_num: u32,

    /// Maximum selections. Effective only for checkbox types. 0 = no bound.
    #[serde(default)]
    pub max_num: u32,

    /// Show per-option counts on the public detail view (vote types only).
    #[serde(default)]
    pub show_stats: bool,

    /// Counts only become visible once the caller has submitted.
    #[serde(default)]
    pub show_stats_after_submit: bool,

    /// Also compute competition ranks for the counts.
    #[serde(default)]
    pub show_rank: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Vertical,
    Horizontal,
}

/// One selectable option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    /// Unique within the owning question.
    pub id: String,
    pub text: String,

    /// Whether selecting this option opens a free-text companion field.
    #[serde(default)]
    pub others: bool,

    /// Pseudo-question id the companion answer is submitted under.
    /// Must not collide with any option id or real question id.
    #[serde(default)]
    pub others_key: String,

    /// Companion answer is mandatory when this option is selected.
    #[serde(default)]
    pub must_others: bool,

    #[serde(default)]
    pub placeholder: String,
}

/// Payload for upload questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConf {
    pub upload_type: UploadKind,

    /// Allowed extensions for the generic file sub-type. Empty = unrestricted.
    /// Cleared for the image sub-type, which uses a fixed allow-list.
    #[serde(default)]
    pub allowed_file_type: Vec<String>,

    /// Per-file size cap in MB, 1..=100.
    #[serde(default)]
    pub max_file_size: u32,

    /// File count cap, 1..=10.
    #[serde(default)]
    pub max_file_num: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    File,
    Image,
}

/// Banner/title metadata shown above the form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BannerConf {
    pub title_conf: TitleConf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleConf {
    pub main_title: String,
    #[serde(default)]
    pub sub_title: String,
}

impl QuestionItem {
    pub fn category(&self) -> Category {
        match &self.kind {
            QuestionKind::Text(_) | QuestionKind::Textarea(_) => Category::Input,
            QuestionKind::Radio(_)
            | QuestionKind::Checkbox(_)
            | QuestionKind::VoteRadio(_)
            | QuestionKind::VoteCheckbox(_) => Category::Option,
            QuestionKind::Upload(_) => Category::Upload,
        }
    }

    /// Checkbox flavors carry selection count bounds.
    pub fn is_checkbox(&self) -> bool {
        matches!(
            self.kind,
            QuestionKind::Checkbox(_) | QuestionKind::VoteCheckbox(_)
        )
    }

    /// Vote flavors may expose statistics on the public detail view.
    pub fn is_vote(&self) -> bool {
        matches!(
            self.kind,
            QuestionKind::VoteRadio(_) | QuestionKind::VoteCheckbox(_)
        )
    }

    pub fn choice_conf(&self) -> Option<&ChoiceConf> {
        match &self.kind {
            QuestionKind::Radio(c)
            | QuestionKind::Checkbox(c)
            | QuestionKind::VoteRadio(c)
            | QuestionKind::VoteCheckbox(c) => Some(c),
            _ => None,
        }
    }
}

/// `"%Y-%m-%d %H:%M:%S"` (de)serialization for the availability window.
pub mod datetime_format {
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(dt: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}
