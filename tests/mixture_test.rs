mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{response_json, TestApp};

async fn seed_sku_bin_batch(app: &TestApp, sku: &str, bin: &str, batch: &str, qty: i64) {
    let resp = app
        .request(Method::POST, "/api/skus", Some(json!({"id": sku, "name": sku})))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .request(Method::POST, "/api/bins", Some(json!({"id": bin})))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .request(
            Method::POST,
            "/api/batches",
            Some(json!({"id": batch, "sku_id": sku, "qty_remaining": qty.to_string()})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .request(
            Method::POST,
            &format!("/api/bin/{bin}/contents"),
            Some(json!({"id": batch, "quantity": qty.to_string()})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn create_draw_and_split_mixture() {
    let app = TestApp::new();

    seed_sku_bin_batch(&app, "SKU1", "BIN100", "BAT100", 6).await;
    let resp = app
        .request(
            Method::POST,
            "/api/batches",
            Some(json!({"id": "BAT101", "sku_id": "SKU1", "qty_remaining": "4"})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = app
        .request(
            Method::POST,
            "/api/bin/BIN100/contents",
            Some(json!({"id": "BAT101", "quantity": "4"})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .request(
            Method::POST,
            "/api/mixtures",
            Some(json!({
                "mix_id": "MIX100",
                "bin_id": "BIN100",
                "sku_id": "SKU1",
                "components": [
                    {"batch_id": "BAT100", "quantity": "6"},
                    {"batch_id": "BAT101", "quantity": "4"}
                ],
                "created_by": "tester"
            })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = response_json(resp).await;
    assert_eq!(body["Id"], "/api/mixture/MIX100");
    assert_eq!(body["state"]["qty_total"], "10");
    let ops: Vec<&str> = body["operations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["rel"].as_str().unwrap())
        .collect();
    assert!(ops.contains(&"draw"));
    assert!(ops.contains(&"split"));
    assert!(ops.contains(&"append-audit"));

    let resp = app
        .request(
            Method::POST,
            "/api/mixture/MIX100/draw",
            Some(json!({"quantity": "5", "created_by": "tester"})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = response_json(resp).await;
    assert_eq!(body["state"]["qty_total"], "5");
    let components = body["state"]["components"].as_array().unwrap();
    assert_eq!(components[0]["qty_remaining"], "3");
    assert_eq!(components[1]["qty_remaining"], "2");
}

#[tokio::test]
async fn split_mixture_produces_two_independent_mixtures() {
    let app = TestApp::new();

    seed_sku_bin_batch(&app, "SKU2", "BIN200", "BAT300", 8).await;
    app.request(
        Method::POST,
        "/api/batches",
        Some(json!({"id": "BAT301", "sku_id": "SKU2", "qty_remaining": "4"})),
    )
    .await;
    app.request(
        Method::POST,
        "/api/bin/BIN200/contents",
        Some(json!({"id": "BAT301", "quantity": "4"})),
    )
    .await;
    app.request(Method::POST, "/api/bins", Some(json!({"id": "BIN201"})))
        .await;

    app.request(
        Method::POST,
        "/api/mixtures",
        Some(json!({
            "mix_id": "MIX300",
            "bin_id": "BIN200",
            "sku_id": "SKU2",
            "components": [
                {"batch_id": "BAT300", "quantity": "8"},
                {"batch_id": "BAT301", "quantity": "4"}
            ],
            "created_by": "tester"
        })),
    )
    .await;

    let resp = app
        .request(
            Method::POST,
            "/api/mixture/MIX300/split",
            Some(json!({
                "quantity": "6",
                "destination_bin": "BIN201",
                "new_mix_id": "MIX301",
                "created_by": "tester"
            })),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = response_json(resp).await;
    assert_eq!(body["Id"], "/api/mixture/MIX301");
    assert_eq!(body["state"]["qty_total"], "6");

    let resp = app.request(Method::GET, "/api/mixture/MIX300", None).await;
    let body = response_json(resp).await;
    assert_eq!(body["state"]["qty_total"], "6");
}

#[tokio::test]
async fn draw_more_than_available_is_rejected() {
    let app = TestApp::new();
    seed_sku_bin_batch(&app, "SKU3", "BIN400", "BAT400", 5).await;

    app.request(
        Method::POST,
        "/api/mixtures",
        Some(json!({
            "mix_id": "MIX400",
            "bin_id": "BIN400",
            "sku_id": "SKU3",
            "components": [{"batch_id": "BAT400", "quantity": "5"}],
            "created_by": "tester"
        })),
    )
    .await;

    let resp = app
        .request(
            Method::POST,
            "/api/mixture/MIX400/draw",
            Some(json!({"quantity": "50", "created_by": "tester"})),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = response_json(resp).await;
    assert_eq!(body["type"], "insufficient-quantity");
}

#[tokio::test]
async fn missing_mixture_returns_404() {
    let app = TestApp::new();
    let resp = app.request(Method::GET, "/api/mixture/MIX999", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
