// tests/stats_tests.rs

use serde_json::json;
use survey_backend::error::AppError;
use survey_backend::schema::{SurveySchema, validate::StatIncrement};
use survey_backend::stats::{competition_ranks, seeds_for_schema, seeds_for_update};

fn schema_with_items(items: serde_json::Value) -> SurveySchema {
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

#[test]
fn creation_seeds_every_option_of_every_option_question() {
    let schema = schema_with_items(json!([
        {"id": "q1", "type": "radio", "title": "One", "options": [
            {"id": "a", "text": "A"}, {"id": "b", "text": "B"},
        ]},
        {"id": "q2", "type": "text", "title": "Name"},
        {"id": "q3", "type": "vote-checkbox", "title": "Many", "options": [
            {"id": "x", "text": "X"},
        ]},
    ]));

    let seeds = seeds_for_schema(7, &schema);

    let keys: Vec<(i64, &str, &str)> = seeds
        .iter()
        .map(|s| (s.survey_id, s.question_id.as_str(), s.option_id.as_str()))
        .collect();
    assert_eq!(keys.len(), 3);
    assert!(keys.contains(&(7, "q1", "a")));
    assert!(keys.contains(&(7, "q1", "b")));
    assert!(keys.contains(&(7, "q3", "x")));
}

#[test]
fn update_seeds_only_new_questions_and_new_options() {
    let old = schema_with_items(json!([
        {"id": "q1", "type": "radio", "title": "One", "options": [
            {"id": "a", "text": "A"}, {"id": "b", "text": "B"},
        ]},
    ]));
    // q1 keeps 'a', drops 'b', gains 'c'; q2 is brand new
    let new = schema_with_items(json!([
        {"id": "q1", "type": "radio", "title": "One", "options": [
            {"id": "a", "text": "A"}, {"id": "c", "text": "C"},
        ]},
        {"id": "q2", "type": "checkbox", "title": "Two", "options": [
            {"id": "x", "text": "X"}, {"id": "y", "text": "Y"},
        ]},
    ]));

    let seeds = seeds_for_update(7, &old, &new).expect("diff should accept");

    let keys: Vec<(&str, &str)> = seeds
        .iter()
        .map(|s| (s.question_id.as_str(), s.option_id.as_str()))
        .collect();
    // 'a' is never re-seeded, 'b' is never deleted (it becomes an orphan)
    assert_eq!(keys, vec![("q1", "c"), ("q2", "x"), ("q2", "y")]);
}

#[test]
fn category_change_rejected_even_without_answers() {
    let old = schema_with_items(json!([
        {"id": "q1", "type": "text", "title": "Name"},
    ]));
    let new = schema_with_items(json!([
        {"id": "q1", "type": "upload", "title": "Name",
         "upload_type": "file", "max_file_size": 10, "max_file_num": 1},
    ]));

    let err = seeds_for_update(7, &old, &new).expect_err("must reject");
    match err {
        AppError::SchemaInvalid(msg) => {
            assert!(msg.contains("q1"));
            assert!(msg.contains("input"));
            assert!(msg.contains("upload"));
        }
        other => panic!("expected SchemaInvalid, got {:?}", other),
    }
}

#[test]
fn narrowing_within_a_category_is_permitted() {
    let old = schema_with_items(json!([
        {"id": "q1", "type": "radio", "title": "Pick", "options": [{"id": "a", "text": "A"}]},
    ]));
    let new = schema_with_items(json!([
        {"id": "q1", "type": "checkbox", "title": "Pick", "options": [{"id": "a", "text": "A"}]},
    ]));

    let seeds = seeds_for_update(7, &old, &new).expect("radio -> checkbox is compatible");
    assert!(seeds.is_empty());
}

#[test]
fn increment_batches_order_by_question_then_option() {
    let mut batch = vec![
        inc("q2", "b"),
        inc("q1", "z"),
        inc("q2", "a"),
        inc("q1", "a"),
        inc("q1", "a"),
    ];

    batch.sort();

    let order: Vec<(&str, &str)> = batch
        .iter()
        .map(|i| (i.question_id.as_str(), i.option_id.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![("q1", "a"), ("q1", "a"), ("q1", "z"), ("q2", "a"), ("q2", "b")]
    );
}

fn inc(question_id: &str, option_id: &str) -> StatIncrement {
    StatIncrement {
        question_id: question_id.to_string(),
        option_id: option_id.to_string(),
    }
}

#[test]
fn competition_ranking_shares_ranks_on_ties() {
    assert_eq!(competition_ranks(&[10, 10, 7]), vec![1, 1, 3]);
    assert_eq!(competition_ranks(&[7, 10, 10]), vec![3, 1, 1]);
    assert_eq!(competition_ranks(&[3, 3, 3]), vec![1, 1, 1]);
    assert_eq!(competition_ranks(&[1, 2, 3]), vec![3, 2, 1]);
    assert_eq!(competition_ranks(&[5]), vec![1]);
    assert_eq!(competition_ranks(&[]), Vec::<i64>::new());
}
