//! Router-level coverage driven through `tower::ServiceExt::oneshot`, the
//! same way a client would exercise the deployed service.

mod common {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;
    use workbook::router::{workbook_router, WorkbookServices};
    use workbook::store::{InMemoryFileStorage, InMemoryStore, RecordingCompletionGate};
    use workbook::types::ItemTypeRegistry;

    pub(super) fn build_router() -> axum::Router {
        let store = Arc::new(InMemoryStore::new());
        let files = Arc::new(InMemoryFileStorage::default());
        let gate = Arc::new(RecordingCompletionGate::default());
        let registry = Arc::new(ItemTypeRegistry::with_builtins());
        workbook_router(Arc::new(WorkbookServices::new(store, files, gate, registry)))
    }

    pub(super) async fn send(
        router: &axum::Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> Response<axum::body::Body> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        router.clone().oneshot(request).await.expect("dispatch")
    }

    pub(super) async fn json_body(response: Response<axum::body::Body>) -> Value {
        let bytes = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    pub(super) async fn expect_json(
        router: &axum::Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        status: StatusCode,
    ) -> Value {
        let response = send(router, method, uri, body).await;
        assert_eq!(response.status(), status, "unexpected status for {method} {uri}");
        json_body(response).await
    }
}

mod checklist_routes {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn sections_and_items_build_up_in_order() {
        let router = build_router();

        let section = expect_json(
            &router,
            "POST",
            "/api/v1/checklist/sections",
            Some(json!({ "definition_id": 1, "name": "Safety" })),
            StatusCode::CREATED,
        )
        .await;
        assert_eq!(section["position"], 0);
        let section_id = section["id"].as_u64().expect("section id");

        for (index, name) in ["Gloves", "Gowning"].iter().enumerate() {
            let item = expect_json(
                &router,
                "POST",
                &format!("/api/v1/checklist/sections/{section_id}/items"),
                Some(json!({ "name": name, "item_type": "text_input" })),
                StatusCode::CREATED,
            )
            .await;
            assert_eq!(item["position"], index as u64);
            assert_eq!(item["is_required"], true);
        }

        let detail = expect_json(
            &router,
            "GET",
            &format!("/api/v1/checklist/sections/{section_id}"),
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(detail["items"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn unknown_item_types_are_unprocessable() {
        let router = build_router();
        let section = expect_json(
            &router,
            "POST",
            "/api/v1/checklist/sections",
            Some(json!({ "definition_id": 1, "name": "Safety" })),
            StatusCode::CREATED,
        )
        .await;
        let section_id = section["id"].as_u64().expect("section id");

        let response = send(
            &router,
            "POST",
            &format!("/api/v1/checklist/sections/{section_id}/items"),
            Some(json!({ "name": "Essay", "item_type": "essay" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn a_patch_can_rename_and_move_in_one_call() {
        let router = build_router();
        let section = expect_json(
            &router,
            "POST",
            "/api/v1/checklist/sections",
            Some(json!({ "definition_id": 1, "name": "Safety" })),
            StatusCode::CREATED,
        )
        .await;
        let section_id = section["id"].as_u64().expect("section id");

        let mut item_ids = Vec::new();
        for name in ["A", "B"] {
            let item = expect_json(
                &router,
                "POST",
                &format!("/api/v1/checklist/sections/{section_id}/items"),
                Some(json!({ "name": name, "item_type": "text_input" })),
                StatusCode::CREATED,
            )
            .await;
            item_ids.push(item["id"].as_u64().expect("item id"));
        }

        let patched = expect_json(
            &router,
            "PATCH",
            &format!("/api/v1/checklist/items/{}", item_ids[1]),
            Some(json!({ "name": "B2", "move": "up" })),
            StatusCode::OK,
        )
        .await;
        assert_eq!(patched["name"], "B2");
        assert_eq!(patched["position"], 0);
    }

    #[tokio::test]
    async fn an_item_reads_back_with_its_config() {
        let router = build_router();
        let section = expect_json(
            &router,
            "POST",
            "/api/v1/checklist/sections",
            Some(json!({ "definition_id": 1, "name": "Safety" })),
            StatusCode::CREATED,
        )
        .await;
        let section_id = section["id"].as_u64().expect("section id");
        let item = expect_json(
            &router,
            "POST",
            &format!("/api/v1/checklist/sections/{section_id}/items"),
            Some(json!({ "name": "Grade", "item_type": "select_menu" })),
            StatusCode::CREATED,
        )
        .await;
        let item_id = item["id"].as_u64().expect("item id");

        expect_json(
            &router,
            "PATCH",
            &format!("/api/v1/checklist/items/{item_id}"),
            Some(json!({ "config": { "options": [{ "id": 1, "value": "Pass" }] } })),
            StatusCode::OK,
        )
        .await;

        let detail = expect_json(
            &router,
            "GET",
            &format!("/api/v1/checklist/items/{item_id}"),
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(detail["item"]["name"], "Grade");
        assert_eq!(detail["item"]["item_type"], "select_menu");
        let options = detail["config"]["options"].as_str().expect("stored options");
        assert!(options.contains("Pass"));

        let response = send(&router, "GET", "/api/v1/checklist/items/9999", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_a_section_answers_no_content_then_not_found() {
        let router = build_router();
        let section = expect_json(
            &router,
            "POST",
            "/api/v1/checklist/sections",
            Some(json!({ "definition_id": 1, "name": "Safety" })),
            StatusCode::CREATED,
        )
        .await;
        let section_id = section["id"].as_u64().expect("section id");

        let response = send(
            &router,
            "DELETE",
            &format!("/api/v1/checklist/sections/{section_id}"),
            None,
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::NO_CONTENT);

        let response = send(
            &router,
            "GET",
            &format!("/api/v1/checklist/sections/{section_id}"),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

mod evaluation_routes {
    use super::common::*;
    use axum::http::StatusCode;
    use serde_json::json;

    async fn seeded_item(router: &axum::Router) -> u64 {
        let section = expect_json(
            router,
            "POST",
            "/api/v1/checklist/sections",
            Some(json!({ "definition_id": 1, "name": "Safety" })),
            StatusCode::CREATED,
        )
        .await;
        let section_id = section["id"].as_u64().expect("section id");
        let item = expect_json(
            router,
            "POST",
            &format!("/api/v1/checklist/sections/{section_id}/items"),
            Some(json!({ "name": "Gloves", "item_type": "text_input" })),
            StatusCode::CREATED,
        )
        .await;
        item["id"].as_u64().expect("item id")
    }

    #[tokio::test]
    async fn saving_a_response_opens_the_evaluation_lazily() {
        let router = build_router();
        let item_id = seeded_item(&router).await;

        let saved = expect_json(
            &router,
            "PUT",
            &format!("/api/v1/checklist/items/{item_id}/response"),
            Some(json!({ "subject_id": 77, "value": "worn correctly" })),
            StatusCode::OK,
        )
        .await;
        assert_eq!(saved["saved"], true);
        assert_eq!(saved["response"]["version"], 1);

        let progress = expect_json(
            &router,
            "GET",
            "/api/v1/evaluations/progress?definition_id=1&subject_id=77",
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(progress["completed"], 1);
        assert_eq!(progress["required"], 1);
        assert_eq!(progress["complete"], true);
    }

    #[tokio::test]
    async fn empty_text_answers_come_back_as_conflicts() {
        let router = build_router();
        let item_id = seeded_item(&router).await;

        let declined = expect_json(
            &router,
            "PUT",
            &format!("/api/v1/checklist/items/{item_id}/response"),
            Some(json!({ "subject_id": 77, "value": "   " })),
            StatusCode::CONFLICT,
        )
        .await;
        assert_eq!(declined["saved"], false);
        assert_eq!(declined["declined"], "empty_response");
    }

    #[tokio::test]
    async fn progress_reads_never_open_an_evaluation() {
        let router = build_router();
        seeded_item(&router).await;

        let response = send(
            &router,
            "GET",
            "/api/v1/evaluations/progress?definition_id=1&subject_id=77",
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn the_lifecycle_round_trips_over_http() {
        let router = build_router();
        let item_id = seeded_item(&router).await;

        let evaluation = expect_json(
            &router,
            "POST",
            "/api/v1/evaluations",
            Some(json!({ "definition_id": 1, "subject_id": 77 })),
            StatusCode::OK,
        )
        .await;
        let evaluation_id = evaluation["id"].as_u64().expect("evaluation id");
        assert_eq!(evaluation["version"], 1);

        // Re-versioning a draft is a decline, not an error.
        let declined = expect_json(
            &router,
            "POST",
            &format!("/api/v1/evaluations/{evaluation_id}/versions"),
            None,
            StatusCode::CONFLICT,
        )
        .await;
        assert_eq!(declined["declined"], "not_finalised");

        let finalised = expect_json(
            &router,
            "POST",
            &format!("/api/v1/evaluations/{evaluation_id}/finalise"),
            Some(json!({ "finalised_by": 9 })),
            StatusCode::OK,
        )
        .await;
        assert_eq!(finalised["finalised"], true);

        let refused = expect_json(
            &router,
            "PUT",
            &format!("/api/v1/checklist/items/{item_id}/response"),
            Some(json!({ "subject_id": 77, "value": "too late" })),
            StatusCode::CONFLICT,
        )
        .await;
        assert_eq!(refused["declined"], "evaluation_closed");

        let next = expect_json(
            &router,
            "POST",
            &format!("/api/v1/evaluations/{evaluation_id}/versions"),
            None,
            StatusCode::CREATED,
        )
        .await;
        assert_eq!(next["version"], 2);
        assert_eq!(next["active"], true);
    }
}
