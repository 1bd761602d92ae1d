use serde_json::json;

use crate::common::{TestApp, routes, screening_fields};

mod create {
    use super::*;

    #[tokio::test]
    async fn staff_can_create_a_pending_event() {
        let app = TestApp::spawn().await;
        let staff = app.create_user_with_role("sam", "securepass", "staff").await;

        let res = app
            .post_with_token(
                routes::EVENTS,
                &json!({
                    "title": "  Riverside Screening  ",
                    "event_date": "2024-05-01T09:00:00Z",
                    "fields": [
                        {"label": " Name ", "type": "text", "required": true},
                        {"label": "Site", "type": "select", "options": [" North ", "", "South"]},
                    ],
                }),
                &staff,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["title"], "Riverside Screening");
        assert_eq!(res.body["status"], "pending");
        assert_eq!(res.body["is_public"], false);
        assert_eq!(res.body["fields"][0]["label"], "Name");
        assert_eq!(res.body["fields"][0]["width"], "full");
        assert_eq!(res.body["fields"][1]["options"], json!(["North", "South"]));
    }

    #[tokio::test]
    async fn volunteers_cannot_create_events() {
        let app = TestApp::spawn().await;
        let volunteer = app.create_authenticated_user("vic", "securepass").await;

        let res = app
            .post_with_token(
                routes::EVENTS,
                &json!({"title": "Mine", "event_date": "2024-05-01T09:00:00Z"}),
                &volunteer,
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn duplicate_labels_are_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;

        let res = app
            .post_with_token(
                routes::EVENTS,
                &json!({
                    "title": "Dupes",
                    "event_date": "2024-05-01T09:00:00Z",
                    "fields": [
                        {"label": "Age", "type": "number"},
                        {"label": "Age ", "type": "text"},
                    ],
                }),
                &admin,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unsafe_labels_are_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;

        for label in ["__proto__", "$where", "a.b"] {
            let res = app
                .post_with_token(
                    routes::EVENTS,
                    &json!({
                        "title": "Unsafe",
                        "event_date": "2024-05-01T09:00:00Z",
                        "fields": [{"label": label, "type": "text"}],
                    }),
                    &admin,
                )
                .await;
            assert_eq!(res.status, 400, "label {label} was accepted");
        }
    }

    #[tokio::test]
    async fn select_without_options_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;

        let res = app
            .post_with_token(
                routes::EVENTS,
                &json!({
                    "title": "Empty select",
                    "event_date": "2024-05-01T09:00:00Z",
                    "fields": [{"label": "Site", "type": "select"}],
                }),
                &admin,
            )
            .await;

        assert_eq!(res.status, 400);
    }
}

mod visibility {
    use super::*;

    #[tokio::test]
    async fn pending_events_are_hidden_from_other_users() {
        let app = TestApp::spawn().await;
        let staff = app.create_user_with_role("sam", "securepass", "staff").await;
        let other = app.create_authenticated_user("vic", "securepass").await;
        let id = app.create_event(&staff, "Pending", screening_fields(), true).await;

        let res = app.get_with_token(&routes::event(id), &other).await;
        assert_eq!(res.status, 404);

        let res = app.get_without_token(&routes::event(id)).await;
        assert_eq!(res.status, 404);

        let res = app.get_with_token(&routes::event(id), &staff).await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn list_depends_on_the_caller() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let staff = app.create_user_with_role("sam", "securepass", "staff").await;
        let volunteer = app.create_authenticated_user("vic", "securepass").await;

        app.create_approved_event(&admin, "Public approved", screening_fields(), true)
            .await;
        app.create_approved_event(&admin, "Private approved", screening_fields(), false)
            .await;
        app.create_event(&staff, "Staff pending", screening_fields(), true)
            .await;

        let titles = |body: &serde_json::Value| -> Vec<String> {
            let mut titles: Vec<String> = body["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|e| e["title"].as_str().unwrap().to_string())
                .collect();
            titles.sort();
            titles
        };

        let res = app.get_with_token(routes::EVENTS, &admin).await;
        assert_eq!(res.body["pagination"]["total"], 3);

        let res = app.get_with_token(routes::EVENTS, &staff).await;
        assert_eq!(
            titles(&res.body),
            vec!["Private approved", "Public approved", "Staff pending"]
        );

        let res = app.get_with_token(routes::EVENTS, &volunteer).await;
        assert_eq!(titles(&res.body), vec!["Private approved", "Public approved"]);

        let res = app.get_without_token(routes::EVENTS).await;
        assert_eq!(titles(&res.body), vec!["Public approved"]);
    }

    #[tokio::test]
    async fn list_supports_search_and_rejects_unknown_sort() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        app.create_event(&admin, "Riverside 50%", screening_fields(), true)
            .await;
        app.create_event(&admin, "Hilltop", screening_fields(), true)
            .await;

        let res = app
            .get_with_token(&format!("{}?search=RIVER", routes::EVENTS), &admin)
            .await;
        assert_eq!(res.body["pagination"]["total"], 1);
        assert_eq!(res.body["data"][0]["record_count"], 0);

        let res = app
            .get_with_token(&format!("{}?search=%25", routes::EVENTS), &admin)
            .await;
        assert_eq!(res.body["pagination"]["total"], 1);

        let res = app
            .get_with_token(&format!("{}?sort_by=owner", routes::EVENTS), &admin)
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn list_reports_record_counts_per_event() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let busy = app
            .create_approved_event(&admin, "Busy", screening_fields(), true)
            .await;
        app.create_approved_event(&admin, "Quiet", screening_fields(), true)
            .await;
        app.submit(busy, json!({"Name": "Ana", "Age": 34}), None).await;
        app.submit(busy, json!({"Name": "Ben", "Age": 51}), None).await;

        let res = app
            .get_with_token(&format!("{}?sort_by=title&sort_order=asc", routes::EVENTS), &admin)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["data"][0]["title"], "Busy");
        assert_eq!(res.body["data"][0]["record_count"], 2);
        assert_eq!(res.body["data"][1]["title"], "Quiet");
        assert_eq!(res.body["data"][1]["record_count"], 0);
    }

    #[tokio::test]
    async fn access_code_is_only_shown_to_managers() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let volunteer = app.create_authenticated_user("vic", "securepass").await;
        let id = app
            .create_approved_event(&admin, "Locked", screening_fields(), false)
            .await;
        app.patch_with_token(&routes::event(id), &json!({"access_code": "OPEN-SESAME"}), &admin)
            .await;

        let res = app.get_with_token(&routes::event(id), &admin).await;
        assert_eq!(res.body["access_code"], "OPEN-SESAME");

        let res = app.get_with_token(&routes::event(id), &volunteer).await;
        assert_eq!(res.status, 200);
        assert!(res.body["access_code"].is_null());
    }
}

mod update {
    use super::*;

    #[tokio::test]
    async fn owner_can_patch_and_clear_access_code() {
        let app = TestApp::spawn().await;
        let staff = app.create_user_with_role("sam", "securepass", "staff").await;
        let id = app.create_event(&staff, "Draft", screening_fields(), false).await;

        let res = app
            .patch_with_token(
                &routes::event(id),
                &json!({"title": "Final", "access_code": "ABC123"}),
                &staff,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["title"], "Final");
        assert_eq!(res.body["access_code"], "ABC123");

        let res = app
            .patch_with_token(&routes::event(id), &json!({"description": "x"}), &staff)
            .await;
        assert_eq!(res.body["access_code"], "ABC123");

        let res = app
            .patch_with_token(&routes::event(id), &json!({"access_code": null}), &staff)
            .await;
        assert!(res.body["access_code"].is_null());
    }

    #[tokio::test]
    async fn other_staff_cannot_patch() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let staff = app.create_user_with_role("sam", "securepass", "staff").await;
        let id = app
            .create_approved_event(&admin, "Admin's", screening_fields(), true)
            .await;

        let res = app
            .patch_with_token(&routes::event(id), &json!({"title": "Mine now"}), &staff)
            .await;

        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn empty_patch_returns_event_unchanged() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app.create_event(&admin, "Same", screening_fields(), true).await;

        let before = app.get_with_token(&routes::event(id), &admin).await;
        let res = app.patch_with_token(&routes::event(id), &json!({}), &admin).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["updated_at"], before.body["updated_at"]);
    }
}

mod review {
    use super::*;

    #[tokio::test]
    async fn admin_can_reject_with_a_note() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let staff = app.create_user_with_role("sam", "securepass", "staff").await;
        let id = app.create_event(&staff, "Needs work", screening_fields(), true).await;

        let res = app
            .post_with_token(
                &routes::event_review(id),
                &json!({"status": "rejected", "note": "Add a consent field"}),
                &admin,
            )
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "rejected");
        assert_eq!(res.body["review_note"], "Add a consent field");
    }

    #[tokio::test]
    async fn owners_cannot_approve_their_own_events() {
        let app = TestApp::spawn().await;
        let staff = app.create_user_with_role("sam", "securepass", "staff").await;
        let id = app.create_event(&staff, "Self review", screening_fields(), true).await;

        let res = app
            .post_with_token(&routes::event_review(id), &json!({"status": "approved"}), &staff)
            .await;

        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn review_back_to_pending_is_rejected() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app.create_event(&admin, "Undecided", screening_fields(), true).await;

        let res = app
            .post_with_token(&routes::event_review(id), &json!({"status": "pending"}), &admin)
            .await;

        assert_eq!(res.status, 400);
    }
}

mod form {
    use super::*;

    #[tokio::test]
    async fn public_form_resolves_master_data_options() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let res = app
            .put_with_token(
                &routes::admin_master_data("locations"),
                &json!({"values": ["North Clinic", "Riverside Hall"]}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let id = app
            .create_approved_event(
                &admin,
                "Clinic day",
                json!([
                    {"label": "Location", "type": "select", "master_list": "locations"},
                    {"label": "Notes", "type": "text"},
                ]),
                true,
            )
            .await;

        let res = app.get_without_token(&routes::event_form(id)).await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["accepting_submissions"], true);
        assert_eq!(
            res.body["fields"][0]["options"],
            json!(["North Clinic", "Riverside Hall"])
        );
    }

    #[tokio::test]
    async fn private_form_needs_the_access_code() {
        let app = TestApp::spawn().await;
        let admin = app.admin_token().await;
        let id = app
            .create_approved_event(&admin, "Invite only", screening_fields(), false)
            .await;
        app.patch_with_token(&routes::event(id), &json!({"access_code": "LETMEIN"}), &admin)
            .await;

        let res = app.get_without_token(&routes::event_form(id)).await;
        assert_eq!(res.status, 404);

        let res = app
            .get_without_token(&format!("{}?access_code=WRONG", routes::event_form(id)))
            .await;
        assert_eq!(res.status, 404);

        let res = app
            .get_without_token(&format!("{}?access_code=LETMEIN", routes::event_form(id)))
            .await;
        assert_eq!(res.status, 200);
    }
}
