use sea_orm::{ActiveModelTrait, Set};
use serde_json::{Value, json};

use crate::common::{TestApp, routes};

use server::entity::record;

fn age_and_result() -> Value {
    json!([
        {"label": "Age", "type": "number", "required": true},
        {"label": "Result", "type": "select", "required": true, "options": ["Positive", "Negative"]},
    ])
}

/// Store a record directly, bypassing submission checks, as legacy data would be.
async fn insert_raw(app: &TestApp, event_id: i32, code: &str, data: Value) {
    let now = chrono::Utc::now();
    record::ActiveModel {
        event_id: Set(event_id),
        data: Set(data),
        submitted_by: Set(None),
        retrieval_code: Set(code.to_string()),
        client_key: Set("ip:test".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&app.db)
    .await
    .expect("Failed to insert record");
}

#[tokio::test]
async fn unparseable_numbers_are_ignored_and_count_as_incomplete() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let event_id = app
        .create_approved_event(&admin, "Screening", age_and_result(), true)
        .await;
    insert_raw(&app, event_id, "AAAAAAAA", json!({"Age": 30, "Result": "Positive"})).await;
    insert_raw(&app, event_id, "BBBBBBBB", json!({"Age": "n/a", "Result": "Negative"})).await;

    let res = app
        .get_with_token(&routes::event_analytics(event_id), &admin)
        .await;

    assert_eq!(res.status, 200, "{}", res.text);
    assert_eq!(res.body["kpis"]["totalPatients"], 2);
    assert_eq!(res.body["kpis"]["completionRate"], 50);
    assert!(res.body["kpis"]["lastEntry"].is_string());

    let age = &res.body["fields"][0];
    assert_eq!(age["label"], "Age");
    assert_eq!(age["type"], "numerical");
    assert_eq!(age["totalResponses"], 1);
    assert_eq!(age["stats"], json!({"average": 30.0, "min": 30.0, "max": 30.0}));

    let result = &res.body["fields"][1];
    assert_eq!(result["type"], "categorical");
    assert_eq!(
        result["data"],
        json!([{"name": "Positive", "value": 1}, {"name": "Negative", "value": 1}])
    );
}

#[tokio::test]
async fn empty_event_has_zero_completion_and_null_stats() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let event_id = app
        .create_approved_event(&admin, "Quiet day", age_and_result(), true)
        .await;

    let res = app
        .get_with_token(&routes::event_analytics(event_id), &admin)
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body["kpis"]["totalPatients"], 0);
    assert_eq!(res.body["kpis"]["completionRate"], 0);
    assert!(res.body["kpis"]["lastEntry"].is_null());
    assert!(res.body["fields"][0]["stats"].is_null());
    assert_eq!(res.body["fields"][1]["data"], json!([]));
}

#[tokio::test]
async fn newly_required_fields_mark_old_records_incomplete() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let event_id = app
        .create_approved_event(
            &admin,
            "Changing form",
            json!([{"label": "Age", "type": "number", "required": true}]),
            true,
        )
        .await;
    app.submit(event_id, json!({"Age": 41}), None).await;

    let res = app
        .get_with_token(&routes::event_analytics(event_id), &admin)
        .await;
    assert_eq!(res.body["kpis"]["completionRate"], 100);

    let res = app
        .patch_with_token(
            &routes::event(event_id),
            &json!({"fields": [
                {"label": "Age", "type": "number", "required": true},
                {"label": "Consent", "type": "checkbox", "required": true},
            ]}),
            &admin,
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);

    let res = app
        .get_with_token(&routes::event_analytics(event_id), &admin)
        .await;
    assert_eq!(res.body["kpis"]["completionRate"], 0);
}

#[tokio::test]
async fn analytics_require_data_access() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let volunteer = app.create_authenticated_user("vic", "securepass").await;
    let event_id = app
        .create_approved_event(&admin, "Restricted", age_and_result(), true)
        .await;

    let res = app
        .get_with_token(&routes::event_analytics(event_id), &volunteer)
        .await;
    assert_eq!(res.status, 403);

    let res = app.get_without_token(&routes::event_analytics(event_id)).await;
    assert_eq!(res.status, 401);
}
