// tests/submission_tests.rs

use std::collections::HashMap;

use serde_json::json;
use survey_backend::error::AppError;
use survey_backend::schema::{SurveySchema, validate::validate_submission};

/// Builds and normalizes a schema around the given question items, the state
/// the validator contract expects.
fn normalized_schema(items: serde_json::Value) -> SurveySchema {
    let mut schema: SurveySchema = serde_json::from_value(json!({
        "version": "1.0.0",
        "base_conf": {
            "begin_time": "2026-01-01 00:00:00",
            "end_time": "2026-12-31 23:59:59",
        },
        "question_conf": { "items": items },
        "banner_conf": { "title_conf": { "main_title": "t" } },
    }))
    .expect("schema should deserialize");
    schema.normalize_and_verify().expect("schema should normalize");
    schema
}

fn answers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn expect_rejection(
    result: Result<Vec<survey_backend::schema::validate::StatIncrement>, AppError>,
) -> String {
    match result {
        Err(AppError::ValidationFailed(msg)) => msg,
        other => panic!("expected ValidationFailed, got {:?}", other),
    }
}

#[test]
fn required_question_rejects_missing_and_blank_answers() {
    let schema = normalized_schema(json!([
        {"id": "q1", "type": "text", "title": "Name", "is_required": true},
    ]));

    let msg = expect_rejection(validate_submission(&schema, &answers(&[])));
    assert!(msg.contains("q1"));

    expect_rejection(validate_submission(&schema, &answers(&[("q1", "")])));
}

#[test]
fn unanswered_optional_question_is_skipped() {
    let schema = normalized_schema(json!([
        {"id": "q1", "type": "radio", "title": "Pick", "options": [{"id": "o1", "text": "A"}]},
    ]));

    let increments = validate_submission(&schema, &answers(&[])).expect("should accept");
    assert!(increments.is_empty());
}

#[test]
fn checkbox_selection_count_bounds() {
    let schema = normalized_schema(json!([
        {
            "id": "q1", "type": "checkbox", "title": "Pick", "min_num": 2, "max_num": 3,
            "options": [
                {"id": "o1", "text": "A"}, {"id": "o2", "text": "B"},
                {"id": "o3", "text": "C"}, {"id": "o4", "text": "D"},
            ],
        },
    ]));

    // One selection is below the minimum
    expect_rejection(validate_submission(&schema, &answers(&[("q1", "o1")])));

    // Four exceed the maximum
    expect_rejection(validate_submission(&schema, &answers(&[("q1", "o1,o2,o3,o4")])));

    // Two are accepted, one increment per selected option
    let increments =
        validate_submission(&schema, &answers(&[("q1", "o1,o3")])).expect("should accept");
    assert_eq!(increments.len(), 2);
    assert!(increments.iter().all(|inc| inc.question_id == "q1"));
}

#[test]
fn unknown_option_rejected() {
    let schema = normalized_schema(json!([
        {"id": "q1", "type": "radio", "title": "Pick", "options": [{"id": "o1", "text": "A"}]},
    ]));

    let msg = expect_rejection(validate_submission(&schema, &answers(&[("q1", "o9")])));
    assert!(msg.contains("o9"));
}

#[test]
fn increments_cover_every_selected_option_across_questions() {
    let schema = normalized_schema(json!([
        {"id": "q1", "type": "radio", "title": "One", "options": [{"id": "a", "text": "A"}]},
        {
            "id": "q2", "type": "vote-checkbox", "title": "Many",
            "options": [{"id": "x", "text": "X"}, {"id": "y", "text": "Y"}],
        },
    ]));

    let increments = validate_submission(&schema, &answers(&[("q1", "a"), ("q2", "y,x")]))
        .expect("should accept");

    let tuples: Vec<(String, String)> = increments
        .into_iter()
        .map(|inc| (inc.question_id, inc.option_id))
        .collect();
    assert_eq!(tuples.len(), 3);
    assert!(tuples.contains(&("q1".into(), "a".into())));
    assert!(tuples.contains(&("q2".into(), "x".into())));
    assert!(tuples.contains(&("q2".into(), "y".into())));
}

#[test]
fn mandatory_companion_answer_enforced() {
    let schema = normalized_schema(json!([
        {
            "id": "q1", "type": "radio", "title": "Pick",
            "options": [
                {"id": "o1", "text": "A"},
                {"id": "o2", "text": "Other", "others": true, "others_key": "q1_other", "must_others": true},
            ],
        },
    ]));

    // Selecting the others option without its companion rejects
    expect_rejection(validate_submission(&schema, &answers(&[("q1", "o2")])));
    expect_rejection(validate_submission(&schema, &answers(&[("q1", "o2"), ("q1_other", "")])));

    // With the companion present it is accepted; the companion itself is not a counter
    let increments =
        validate_submission(&schema, &answers(&[("q1", "o2"), ("q1_other", "dumplings")]))
            .expect("should accept");
    assert_eq!(increments.len(), 1);
    assert_eq!(increments[0].option_id, "o2");
}

#[test]
fn numeric_answers_parse_as_decimals_with_inclusive_range() {
    let schema = normalized_schema(json!([
        {
            "id": "q1", "type": "text", "title": "Price", "valid": "n",
            "number_range": {"min": "0.5", "max": "10"},
        },
    ]));

    // Bounds are inclusive
    validate_submission(&schema, &answers(&[("q1", "0.5")])).expect("lower bound accepted");
    validate_submission(&schema, &answers(&[("q1", "10")])).expect("upper bound accepted");
    validate_submission(&schema, &answers(&[("q1", "3.14")])).expect("interior accepted");

    expect_rejection(validate_submission(&schema, &answers(&[("q1", "10.01")])));
    expect_rejection(validate_submission(&schema, &answers(&[("q1", "0.4999")])));
    expect_rejection(validate_submission(&schema, &answers(&[("q1", "abc")])));
}

#[test]
fn format_rules_match_their_patterns() {
    let schema = normalized_schema(json!([
        {"id": "m", "type": "text", "title": "Phone", "valid": "m"},
        {"id": "e", "type": "text", "title": "Email", "valid": "e"},
        {"id": "c", "type": "text", "title": "Id", "valid": "idcard"},
    ]));

    validate_submission(&schema, &answers(&[("m", "13812345678")])).expect("valid mobile");
    expect_rejection(validate_submission(&schema, &answers(&[("m", "12345")])));

    validate_submission(&schema, &answers(&[("e", "zhang.wei@example.edu.cn")]))
        .expect("valid email");
    expect_rejection(validate_submission(&schema, &answers(&[("e", "not-an-email")])));

    validate_submission(&schema, &answers(&[("c", "11010519900101123X")])).expect("valid id");
    expect_rejection(validate_submission(&schema, &answers(&[("c", "1234")])));
}

#[test]
fn free_text_length_counts_codepoints() {
    let schema = normalized_schema(json!([
        {
            "id": "q1", "type": "textarea", "title": "Feedback", "valid": "*",
            "text_range": {"min": 2, "max": 5},
        },
    ]));

    // CJK text: codepoint counts, not byte counts
    validate_submission(&schema, &answers(&[("q1", "好吃")])).expect("2 codepoints accepted");
    validate_submission(&schema, &answers(&[("q1", "还不错啊嗯")])).expect("5 codepoints accepted");

    expect_rejection(validate_submission(&schema, &answers(&[("q1", "好")])));
    expect_rejection(validate_submission(&schema, &answers(&[("q1", "今天的菜真的不错")])));
}

#[test]
fn free_text_custom_pattern_enforced() {
    let schema = normalized_schema(json!([
        {"id": "q1", "type": "text", "title": "Code", "valid": "*", "regex": "^[A-Z]{3}\\d{2}$"},
    ]));

    validate_submission(&schema, &answers(&[("q1", "ABC12")])).expect("should accept");
    expect_rejection(validate_submission(&schema, &answers(&[("q1", "abc12")])));
}

#[test]
fn image_uploads_use_fixed_extension_allow_list() {
    let schema = normalized_schema(json!([
        {
            "id": "q1", "type": "upload", "title": "Photos",
            "upload_type": "image", "max_file_size": 10, "max_file_num": 2,
        },
    ]));

    // Extensions compare case-insensitively
    validate_submission(&schema, &answers(&[("q1", "a/b/lunch.PNG,menu.jpeg")]))
        .expect("should accept");

    expect_rejection(validate_submission(&schema, &answers(&[("q1", "notes.pdf")])));

    // Count cap
    expect_rejection(validate_submission(&schema, &answers(&[("q1", "a.png,b.png,c.png")])));
}

#[test]
fn file_uploads_respect_admin_extension_list() {
    let schema = normalized_schema(json!([
        {
            "id": "restricted", "type": "upload", "title": "Docs",
            "upload_type": "file", "allowed_file_type": ["pdf", "docx"],
            "max_file_size": 10, "max_file_num": 5,
        },
        {
            "id": "open", "type": "upload", "title": "Anything",
            "upload_type": "file", "max_file_size": 10, "max_file_num": 5,
        },
    ]));

    validate_submission(&schema, &answers(&[("restricted", "thesis.pdf,draft.docx")]))
        .expect("allowed extensions accepted");
    expect_rejection(validate_submission(&schema, &answers(&[("restricted", "pic.png")])));

    // An empty allow-list is unrestricted
    validate_submission(&schema, &answers(&[("open", "archive.tar.gz")]))
        .expect("should accept");
}

#[test]
fn first_failure_rejects_the_whole_submission() {
    let schema = normalized_schema(json!([
        {"id": "q1", "type": "radio", "title": "Pick", "options": [{"id": "o1", "text": "A"}]},
        {"id": "q2", "type": "text", "title": "Phone", "valid": "m"},
    ]));

    // q1 is fine, q2 is not; nothing is accepted
    let result = validate_submission(&schema, &answers(&[("q1", "o1"), ("q2", "bogus")]));
    expect_rejection(result);
}
