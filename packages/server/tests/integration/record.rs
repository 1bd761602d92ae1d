use serde_json::json;

use crate::common::{TestApp, routes, screening_fields};

mod submit {
    use super::*;

    #[tokio::test]
    async fn anonymous_submission_to_public_event_returns_a_code() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Street fair", screening_fields(), true)
            .await;

        let res = app
            .post_without_token(
                &routes::event_records(event_id),
                &json!({"data": {"Name": "Ana", "Age": "34", "Result": "Negative"}}),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["updated"], false);
        assert_eq!(res.body["removed_keys"], 0);
        assert!(res.body["record"]["submitted_by"].is_null());
        let code = res.body["record"]["retrieval_code"].as_str().unwrap();
        assert_eq!(code.len(), 8);
    }

    #[tokio::test]
    async fn signed_in_submission_records_the_submitter() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let volunteer = app.create_authenticated_user("vic", "securepass").await;
        let event_id = app
            .create_approved_event(&admin, "Members only", screening_fields(), false)
            .await;

        let res = app
            .post_with_token(
                &routes::event_records(event_id),
                &json!({"data": {"Name": "Ana", "Age": 34}}),
                &volunteer,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert!(res.body["record"]["submitted_by"].is_number());
    }

    #[tokio::test]
    async fn private_event_is_hidden_without_access_code() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Invite only", screening_fields(), false)
            .await;
        app.patch_with_token(&routes::event(event_id), &json!({"access_code": "LETMEIN"}), &admin)
            .await;
        let data = json!({"Name": "Ana", "Age": 34});

        let res = app
            .post_without_token(&routes::event_records(event_id), &json!({"data": data}))
            .await;
        assert_eq!(res.status, 404);

        let res = app
            .post_without_token(
                &routes::event_records(event_id),
                &json!({"data": data, "access_code": "LETMEIN"}),
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
    }

    #[tokio::test]
    async fn pending_event_rejects_submissions() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app.create_event(&admin, "Not yet", screening_fields(), true).await;

        let res = app
            .post_with_token(
                &routes::event_records(event_id),
                &json!({"data": {"Name": "Ana", "Age": 34}}),
                &admin,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unknown_event_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(&routes::event_records(99999), &json!({"data": {}}))
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn invalid_data_lists_every_problem() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Checks", screening_fields(), true)
            .await;

        let res = app
            .post_without_token(
                &routes::event_records(event_id),
                &json!({"data": {"Age": "old", "Result": "Maybe"}}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        let message = res.body["message"].as_str().unwrap();
        assert!(message.contains("'Name' is required"), "{message}");
        assert!(message.contains("'Age' must be a number"), "{message}");
        assert!(message.contains("'Maybe'"), "{message}");
    }

    #[tokio::test]
    async fn data_must_be_an_object() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Shapes", screening_fields(), true)
            .await;

        let res = app
            .post_without_token(&routes::event_records(event_id), &json!({"data": [1, 2]}))
            .await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn unsafe_keys_are_stripped_and_counted() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Sanitize", screening_fields(), true)
            .await;

        let res = app
            .post_without_token(
                &routes::event_records(event_id),
                &json!({"data": {
                    "Name": "Ana",
                    "Age": 34,
                    "$where": "1 == 1",
                    "Extra": {"constructor": 1, "kept": true},
                }}),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["removed_keys"], 2);
        let data = &res.body["record"]["data"];
        assert!(data.get("$where").is_none());
        assert_eq!(data["Extra"], json!({"kept": true}));
    }

    #[tokio::test]
    async fn closed_submissions_reject_new_records() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Closed", screening_fields(), true)
            .await;
        app.put_with_token(
            routes::ADMIN_CONFIG,
            &json!({"site_name": "Outreach", "registration_open": true, "submissions_open": false}),
            &admin,
        )
        .await;

        let res = app
            .post_without_token(
                &routes::event_records(event_id),
                &json!({"data": {"Name": "Ana", "Age": 34}}),
            )
            .await;
        assert_eq!(res.status, 400);

        let form = app.get_without_token(&routes::event_form(event_id)).await;
        assert_eq!(form.body["accepting_submissions"], false);
    }

    #[tokio::test]
    async fn anonymous_writes_are_rate_limited_per_address() {
        let app = TestApp::spawn_with(|config| {
            config.submission.rate_limit_per_minute = 2;
            config.server.trust_forwarded_headers = true;
        })
        .await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Busy", screening_fields(), true)
            .await;
        let body = json!({"data": {"Name": "Ana", "Age": 34}});
        let path = routes::event_records(event_id);

        for _ in 0..2 {
            let res = app.post_from_ip(&path, &body, "203.0.113.7").await;
            assert_eq!(res.status, 201, "{}", res.text);
        }

        let res = app.post_from_ip(&path, &body, "203.0.113.7").await;
        assert_eq!(res.status, 429);
        assert_eq!(res.body["code"], "RATE_LIMITED");
        let retry: u64 = res.header("retry-after").unwrap().parse().unwrap();
        assert!((1..=60).contains(&retry));

        let res = app.post_from_ip(&path, &body, "198.51.100.2").await;
        assert_eq!(res.status, 201);
    }

    #[tokio::test]
    async fn forwarded_headers_are_ignored_unless_trusted() {
        let app = TestApp::spawn_with(|config| {
            config.submission.rate_limit_per_minute = 2;
        })
        .await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Spoofed", screening_fields(), true)
            .await;
        let body = json!({"data": {"Name": "Ana", "Age": 34}});
        let path = routes::event_records(event_id);

        let res = app.post_from_ip(&path, &body, "1.1.1.1").await;
        assert_eq!(res.status, 201, "{}", res.text);
        let res = app.post_from_ip(&path, &body, "2.2.2.2").await;
        assert_eq!(res.status, 201, "{}", res.text);

        let res = app.post_from_ip(&path, &body, "3.3.3.3").await;
        assert_eq!(res.status, 429);
    }

    #[tokio::test]
    async fn rejected_submissions_use_up_the_allowance() {
        let app = TestApp::spawn_with(|config| {
            config.submission.rate_limit_per_minute = 2;
        })
        .await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Strict", screening_fields(), true)
            .await;
        let path = routes::event_records(event_id);

        for _ in 0..2 {
            let res = app
                .post_without_token(&path, &json!({"data": {"Age": "old"}}))
                .await;
            assert_eq!(res.status, 400, "{}", res.text);
        }

        let res = app
            .post_without_token(&path, &json!({"data": {"Name": "Ana", "Age": 34}}))
            .await;
        assert_eq!(res.status, 429);
    }
}

mod retrieval_code {
    use super::*;

    #[tokio::test]
    async fn resubmitting_with_the_code_updates_in_place() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Corrections", screening_fields(), true)
            .await;
        let (id, code) = app
            .submit(
                event_id,
                json!({"Name": "Ana", "Age": 34, "Result": "Positive", "Note": "typo"}),
                None,
            )
            .await;
        let before = app.get_with_token(&routes::record(id), &admin).await;

        let res = app
            .post_without_token(
                &routes::event_records(event_id),
                &json!({
                    "retrieval_code": code.to_lowercase(),
                    "data": {"Result": "Negative", "Note": null},
                }),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["updated"], true);
        assert_eq!(res.body["record"]["id"], id);
        assert_eq!(res.body["record"]["retrieval_code"], code);
        let data = &res.body["record"]["data"];
        assert_eq!(data["Name"], "Ana");
        assert_eq!(data["Result"], "Negative");
        assert!(data.get("Note").is_none());

        let timestamp = |value: &serde_json::Value| {
            value
                .as_str()
                .unwrap()
                .parse::<chrono::DateTime<chrono::Utc>>()
                .unwrap()
        };
        let record = &res.body["record"];
        assert_eq!(record["created_at"], before.body["created_at"]);
        assert!(timestamp(&record["updated_at"]) > timestamp(&before.body["updated_at"]));

        let list = app.get_with_token(&routes::event_records(event_id), &admin).await;
        assert_eq!(list.body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn unknown_code_creates_nothing() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Corrections", screening_fields(), true)
            .await;

        for code in ["ZZZZZZZZ", "not-a-code"] {
            let res = app
                .post_without_token(
                    &routes::event_records(event_id),
                    &json!({"retrieval_code": code, "data": {"Name": "Ana", "Age": 34}}),
                )
                .await;
            assert_eq!(res.status, 404, "code {code}");
        }

        let list = app.get_with_token(&routes::event_records(event_id), &admin).await;
        assert_eq!(list.body["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn code_from_another_event_is_not_found() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let first = app
            .create_approved_event(&admin, "First", screening_fields(), true)
            .await;
        let second = app
            .create_approved_event(&admin, "Second", screening_fields(), true)
            .await;
        let (_, code) = app
            .submit(first, json!({"Name": "Ana", "Age": 34}), None)
            .await;

        let res = app
            .post_without_token(
                &routes::event_records(second),
                &json!({"retrieval_code": code, "data": {"Age": 35}}),
            )
            .await;

        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn update_that_breaks_a_required_field_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Required", screening_fields(), true)
            .await;
        let (_, code) = app
            .submit(event_id, json!({"Name": "Ana", "Age": 34}), None)
            .await;

        let res = app
            .post_without_token(
                &routes::event_records(event_id),
                &json!({"retrieval_code": code, "data": {"Name": null}}),
            )
            .await;

        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn repeated_updates_with_one_code_are_rate_limited() {
        let app = TestApp::spawn_with(|config| {
            config.submission.rate_limit_per_minute = 3;
        })
        .await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Hammered", screening_fields(), true)
            .await;
        let (_, code) = app
            .submit(event_id, json!({"Name": "Ana", "Age": 34}), None)
            .await;
        let path = routes::event_records(event_id);
        let body = json!({"retrieval_code": code, "data": {"Age": 35}});

        for _ in 0..2 {
            let res = app.post_without_token(&path, &body).await;
            assert_eq!(res.status, 200, "{}", res.text);
        }

        let res = app.post_without_token(&path, &body).await;
        assert_eq!(res.status, 429);
        assert!(res.header("retry-after").is_some());
    }

    #[tokio::test]
    async fn code_lookups_are_rate_limited() {
        let app = TestApp::spawn_with(|config| {
            config.submission.lookup_rate_limit_per_minute = 2;
        })
        .await;

        for _ in 0..2 {
            let res = app.get_without_token(&routes::record_by_code("ZZZZZZZZ")).await;
            assert_eq!(res.status, 404);
        }

        let res = app.get_without_token(&routes::record_by_code("ZZZZZZZZ")).await;
        assert_eq!(res.status, 429);
        assert_eq!(res.body["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn lookup_by_code_ignores_case_and_dashes() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let event_id = app
            .create_approved_event(&admin, "Lookup", screening_fields(), true)
            .await;
        let (id, code) = app
            .submit(event_id, json!({"Name": "Ana", "Age": 34}), None)
            .await;
        let loose = format!("{}-{}", &code[..4], &code[4..]).to_lowercase();

        let res = app.get_without_token(&routes::record_by_code(&loose)).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["id"], id);

        let res = app.get_without_token(&routes::record_by_code("ZZZZZZZZ")).await;
        assert_eq!(res.status, 404);
    }
}

mod access {
    use super::*;

    #[tokio::test]
    async fn owner_and_admin_can_list_but_others_cannot() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let staff = app.create_user_with_role("sam", "securepass", "staff").await;
        let volunteer = app.create_authenticated_user("vic", "securepass").await;
        let event_id = app.create_event(&staff, "Staff event", screening_fields(), true).await;
        app.approve_event(event_id, &admin).await;
        app.submit(event_id, json!({"Name": "Ana", "Age": 34}), None).await;
        app.submit(event_id, json!({"Name": "Ben", "Age": 51}), None).await;

        let res = app.get_with_token(&routes::event_records(event_id), &staff).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["total"], 2);

        let res = app
            .get_with_token(
                &format!("{}?sort_order=asc", routes::event_records(event_id)),
                &admin,
            )
            .await;
        assert_eq!(res.body["data"][0]["data"]["Name"], "Ana");

        let res = app.get_with_token(&routes::event_records(event_id), &volunteer).await;
        assert_eq!(res.status, 403);

        let res = app.get_without_token(&routes::event_records(event_id)).await;
        assert_eq!(res.status, 401);
    }

    #[tokio::test]
    async fn get_record_requires_data_access() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let volunteer = app.create_authenticated_user("vic", "securepass").await;
        let event_id = app
            .create_approved_event(&admin, "Private data", screening_fields(), true)
            .await;
        let (id, _) = app
            .submit(event_id, json!({"Name": "Ana", "Age": 34}), None)
            .await;

        let res = app.get_with_token(&routes::record(id), &admin).await;
        assert_eq!(res.status, 200);

        let res = app.get_with_token(&routes::record(id), &volunteer).await;
        assert_eq!(res.status, 403);

        let res = app.get_with_token(&routes::record(99999), &admin).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn only_admins_delete_records() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let staff = app.create_user_with_role("sam", "securepass", "staff").await;
        let event_id = app.create_event(&staff, "Mine", screening_fields(), true).await;
        app.approve_event(event_id, &admin).await;
        let (id, _) = app
            .submit(event_id, json!({"Name": "Ana", "Age": 34}), None)
            .await;

        let res = app.delete_with_token(&routes::record(id), &staff).await;
        assert_eq!(res.status, 403);

        let res = app.delete_with_token(&routes::record(id), &admin).await;
        assert_eq!(res.status, 204);

        let res = app.delete_with_token(&routes::record(id), &admin).await;
        assert_eq!(res.status, 404);
    }
}
