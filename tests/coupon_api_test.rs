mod common;

use axum::http::{Method, StatusCode};
use common::{cart, decimal, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

fn percentage_coupon(code: &str) -> serde_json::Value {
    json!({
        "code": code,
        "name": "Summer sale",
        "coupon_type": "percentage",
        "value": "10",
        "minimum_order_value": "50",
    })
}

#[tokio::test]
async fn health_reports_up_with_in_memory_backend() {
    let app = TestApp::new().await;

    let (status, body) = app.json(Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["repository_backend"], "in-memory");
    assert!(body.get("database").is_none());
}

#[tokio::test]
async fn apply_prices_a_percentage_coupon() {
    let app = TestApp::new().await;
    app.create_coupon(percentage_coupon("summer10")).await;
    let user = Uuid::new_v4();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": " Summer10 ", "context": cart(user, "100") })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let result = &body["data"];
    assert_eq!(result["is_valid"], true);
    assert_eq!(result["coupon_code"], "SUMMER10");
    assert_eq!(decimal(&result["discount_amount"]), dec!(10.00));
    assert_eq!(decimal(&result["final_total"]), dec!(90.00));
    assert!(result["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn apply_caps_fixed_discount_at_cart_total() {
    let app = TestApp::new().await;
    app.create_coupon(json!({
        "code": "BIGFIXED",
        "name": "Big fixed",
        "coupon_type": "fixed_amount",
        "value": "200",
    }))
    .await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "BIGFIXED", "context": cart(Uuid::new_v4(), "100") })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["discount_amount"]), dec!(100));
    assert_eq!(decimal(&body["data"]["final_total"]), dec!(0));
}

#[tokio::test]
async fn apply_reports_rule_failures_as_data() {
    let app = TestApp::new().await;
    app.create_coupon(percentage_coupon("SUMMER10")).await;
    app.create_coupon(json!({
        "code": "SPRING",
        "name": "Spring sale",
        "coupon_type": "percentage",
        "value": "5",
        "start_date": "2024-03-01T00:00:00Z",
        "end_date": "2024-05-31T23:59:59Z",
    }))
    .await;
    let user = Uuid::new_v4();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "SUMMER10", "context": cart(user, "20") })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_valid"], false);
    assert_eq!(body["data"]["errors"], json!(["MINIMUM_ORDER_VALUE_NOT_MET"]));

    let (_, body) = app
        .json(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "SPRING", "context": cart(user, "100") })),
        )
        .await;
    assert_eq!(body["data"]["errors"], json!(["COUPON_EXPIRED"]));

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "NOPE", "context": cart(user, "100") })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["errors"], json!(["COUPON_NOT_FOUND"]));
    assert!(body["data"].get("discount_amount").is_none());
}

#[tokio::test]
async fn apply_rejects_blank_code_and_negative_totals() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "   ", "context": cart(user, "100") })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("empty"));

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "SUMMER10", "context": { "cart_total": "-1", "user_id": user } })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn auto_apply_picks_the_largest_saving() {
    let app = TestApp::new().await;
    for (code, value) in [("AUTO15", "15"), ("AUTO20", "20")] {
        app.create_coupon(json!({
            "code": code,
            "name": code,
            "coupon_type": "fixed_amount",
            "value": value,
            "is_auto_apply": true,
        }))
        .await;
    }
    app.create_coupon(json!({
        "code": "MANUAL50",
        "name": "Not automatic",
        "coupon_type": "fixed_amount",
        "value": "50",
    }))
    .await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/coupons/auto-apply",
            Some(cart(Uuid::new_v4(), "100")),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["code"], "AUTO20");
    assert_eq!(decimal(&body["data"]["savings"]), dec!(20));
    assert_eq!(decimal(&body["data"]["final_total"]), dec!(80));
}

#[tokio::test]
async fn auto_apply_returns_null_without_candidates() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/coupons/auto-apply",
            Some(cart(Uuid::new_v4(), "100")),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn redeem_consumes_uses_and_release_gives_them_back() {
    let app = TestApp::new().await;
    let created = app
        .create_coupon(json!({
            "code": "ONCE",
            "name": "Single use",
            "coupon_type": "fixed_amount",
            "value": "5",
            "usage_limit": 1,
        }))
        .await;
    let id = created["id"].as_i64().unwrap();
    let buyer = Uuid::new_v4();
    let order = Uuid::new_v4();

    let (status, body) = app
        .json(
            Method::POST,
            "/api/v1/coupons/redeem",
            Some(json!({
                "code": "ONCE",
                "user_id": buyer,
                "order_id": order,
                "context": cart(buyer, "40"),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(decimal(&body["data"]["discount_amount"]), dec!(5));

    let other = Uuid::new_v4();
    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/coupons/redeem",
            Some(json!({
                "code": "ONCE",
                "user_id": other,
                "order_id": Uuid::new_v4(),
                "context": cart(other, "40"),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app
        .json(Method::GET, &format!("/api/v1/admin/coupons/{id}"), None)
        .await;
    assert_eq!(body["data"]["used_count"], 1);
    assert_eq!(body["data"]["status"], "exhausted");

    let (status, body) = app
        .json(
            Method::POST,
            &format!("/api/v1/coupons/redemptions/{order}/release"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_id"], order.to_string());

    let (_, body) = app
        .json(Method::GET, &format!("/api/v1/admin/coupons/{id}"), None)
        .await;
    assert_eq!(body["data"]["used_count"], 0);
    assert_eq!(body["data"]["status"], "active");

    let (status, _) = app
        .json(
            Method::POST,
            &format!("/api/v1/coupons/redemptions/{order}/release"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn redeem_refuses_duplicate_orders_and_mismatched_users() {
    let app = TestApp::new().await;
    app.create_coupon(percentage_coupon("SUMMER10")).await;
    let buyer = Uuid::new_v4();
    let order = Uuid::new_v4();
    let request = json!({
        "code": "SUMMER10",
        "user_id": buyer,
        "order_id": order,
        "context": cart(buyer, "100"),
    });

    let (status, _) = app
        .json(Method::POST, "/api/v1/coupons/redeem", Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .json(Method::POST, "/api/v1/coupons/redeem", Some(request))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/coupons/redeem",
            Some(json!({
                "code": "SUMMER10",
                "user_id": Uuid::new_v4(),
                "order_id": Uuid::new_v4(),
                "context": cart(buyer, "100"),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/coupons/redeem",
            Some(json!({
                "code": "SUMMER10",
                "user_id": buyer,
                "order_id": Uuid::new_v4(),
                "context": cart(buyer, "10"),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/coupons/redeem",
            Some(json!({
                "code": "UNKNOWN",
                "user_id": buyer,
                "order_id": Uuid::new_v4(),
                "context": cart(buyer, "100"),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn redemption_notifies_the_buyer() {
    let app = TestApp::new().await;
    app.create_coupon(percentage_coupon("SUMMER10")).await;
    let buyer = Uuid::new_v4();

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/coupons/redeem",
            Some(json!({
                "code": "SUMMER10",
                "user_id": buyer,
                "order_id": Uuid::new_v4(),
                "context": cart(buyer, "100"),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/api/v1/users/{buyer}/notifications?kind=coupon");
    let delivered = app
        .eventually(|| async {
            let (_, body) = app.json(Method::GET, &uri, None).await;
            body["data"]["total"] == 1
        })
        .await;
    assert!(delivered, "coupon notification was not recorded");
}

#[tokio::test]
async fn admin_create_rejects_duplicates_and_broken_records() {
    let app = TestApp::new().await;
    app.create_coupon(percentage_coupon("SUMMER10")).await;

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(percentage_coupon("summer10")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(json!({
                "code": "TOOMUCH",
                "name": "Over a hundred percent",
                "coupon_type": "percentage",
                "value": "150",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(json!({
                "code": "has space",
                "name": "Bad code",
                "coupon_type": "fixed_amount",
                "value": "5",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_list_filters_and_paginates() {
    let app = TestApp::new().await;
    app.create_coupon(percentage_coupon("SUMMER10")).await;
    app.create_coupon(json!({
        "code": "SUMMER20",
        "name": "Summer sale plus",
        "coupon_type": "percentage",
        "value": "20",
        "is_auto_apply": true,
    }))
    .await;
    app.create_coupon(json!({
        "code": "WINTER",
        "name": "Winter sale",
        "coupon_type": "fixed_amount",
        "value": "5",
        "start_date": "2023-12-01T00:00:00Z",
        "end_date": "2024-02-28T00:00:00Z",
    }))
    .await;

    let (status, body) = app.json(Method::GET, "/api/v1/admin/coupons", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["per_page"], 10);
    assert_eq!(body["data"]["items"][0]["code"], "WINTER");

    let (_, body) = app
        .json(Method::GET, "/api/v1/admin/coupons?status=expired", None)
        .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["code"], "WINTER");

    let (_, body) = app
        .json(Method::GET, "/api/v1/admin/coupons?search=summer&auto_apply=true", None)
        .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["code"], "SUMMER20");

    let (_, body) = app
        .json(Method::GET, "/api/v1/admin/coupons?page=2&per_page=2", None)
        .await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

    let (_, body) = app
        .json(Method::GET, "/api/v1/admin/coupons?per_page=500", None)
        .await;
    assert_eq!(body["data"]["per_page"], 50);
}

#[tokio::test]
async fn admin_update_toggle_and_delete() {
    let app = TestApp::new().await;
    let created = app
        .create_coupon(json!({
            "code": "FLASH",
            "name": "Flash sale",
            "coupon_type": "fixed_amount",
            "value": "5",
            "end_date": "2024-12-31T00:00:00Z",
        }))
        .await;
    let id = created["id"].as_i64().unwrap();
    let uri = format!("/api/v1/admin/coupons/{id}");

    let (status, body) = app
        .json(
            Method::PUT,
            &uri,
            Some(json!({ "name": "Flash sale extended", "end_date": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Flash sale extended");
    assert!(body["data"]["end_date"].is_null());
    assert_eq!(decimal(&body["data"]["value"]), dec!(5));

    let (status, body) = app
        .json(Method::POST, &format!("{uri}/deactivate"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "inactive");

    let (_, body) = app
        .json(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "FLASH", "context": cart(Uuid::new_v4(), "30") })),
        )
        .await;
    assert_eq!(body["data"]["errors"], json!(["COUPON_INACTIVE"]));

    let (_, body) = app
        .json(Method::POST, &format!("{uri}/activate"), None)
        .await;
    assert_eq!(body["data"]["status"], "active");

    let (status, _) = app.json(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.json(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn admin_delete_refuses_redeemed_coupons() {
    let app = TestApp::new().await;
    let created = app.create_coupon(percentage_coupon("SUMMER10")).await;
    let id = created["id"].as_i64().unwrap();
    let buyer = Uuid::new_v4();

    let (status, _) = app
        .json(
            Method::POST,
            "/api/v1/coupons/redeem",
            Some(json!({
                "code": "SUMMER10",
                "user_id": buyer,
                "order_id": Uuid::new_v4(),
                "context": cart(buyer, "100"),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .json(Method::DELETE, &format!("/api/v1/admin/coupons/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn responses_echo_the_request_id() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/admin/coupons", None).await;

    assert!(response.headers().contains_key("x-request-id"));
}
