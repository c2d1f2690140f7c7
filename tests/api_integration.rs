use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{web, App};
use serde_json::{json, Value};

use inapp_purchases::api;
use inapp_purchases::config::PurchaseOrdering;
use inapp_purchases::store::Store;

mod support;

macro_rules! app {
    ($env:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($env.state.clone()))
                .configure(api::configure),
        )
        .await
    };
}

macro_rules! post {
    ($app:expr, $path:expr, $body:expr) => {{
        let req = TestRequest::post().uri($path).set_json($body).to_request();
        let resp = test::call_service(&$app, req).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

#[actix_web::test]
async fn non_post_methods_are_rejected() {
    let env = support::memory_env(PurchaseOrdering::AuthorizeFirst);
    let app = app!(env);

    for req in [
        TestRequest::get().uri("/getProducts").to_request(),
        TestRequest::put().uri("/processPurchase").to_request(),
        TestRequest::delete().uri("/initializeProject").to_request(),
    ] {
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["errorCode"], "METHOD_NOT_ALLOWED");
        assert_eq!(body["statusCode"], 405);
    }
}

#[actix_web::test]
async fn missing_fields_are_reported() {
    let env = support::memory_env(PurchaseOrdering::AuthorizeFirst);
    let app = app!(env);

    let (status, body) = post!(app, "/processPurchase", json!({
        "projectName": "shop",
        "userId": "u1",
        "productId": "",
    }));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "MISSING_FIELD");
    assert!(body["error"].as_str().unwrap().contains("productId"));
    assert_eq!(body["retryable"], false);
    assert!(body["timestamp"].is_string());

    let (status, body) = post!(app, "/addProduct", json!({"projectName": "shop", "name": "x", "type": null, "price": 1}));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "MISSING_FIELD");
}

#[actix_web::test]
async fn malformed_json_is_rejected() {
    let env = support::memory_env(PurchaseOrdering::AuthorizeFirst);
    let app = app!(env);

    let req = TestRequest::post()
        .uri("/initializeProject")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"projectName\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errorCode"], "INVALID_JSON");
}

#[actix_web::test]
async fn initialize_project_is_idempotent() {
    let env = support::memory_env(PurchaseOrdering::AuthorizeFirst);
    let app = app!(env);

    let (status, first) = post!(app, "/initializeProject", json!({"projectName": "Foo"}));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["data"]["exists"], false);
    assert_eq!(first["data"]["initialized"], true);

    let before = env.store.get("projects/Foo").await.unwrap().value.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let (_, second) = post!(app, "/initializeProject", json!({"projectName": "Foo"}));
    assert_eq!(second["data"]["exists"], true);

    let after = env.store.get("projects/Foo").await.unwrap().value.unwrap();
    assert_eq!(before["createdAt"], after["createdAt"]);
    assert_ne!(before["updatedAt"], after["updatedAt"]);

    let (status, body) = post!(app, "/initializeProject", json!({"projectName": "bad.name"}));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "INVALID_PROJECT_NAME");
}

#[actix_web::test]
async fn product_directory_flow() {
    let env = support::memory_env(PurchaseOrdering::AuthorizeFirst);
    let app = app!(env);

    let (status, body) = post!(app, "/getProducts", json!({"projectName": "shop"}));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorCode"], "PROJECT_NOT_FOUND");

    post!(app, "/initializeProject", json!({"projectName": "shop"}));

    let (status, body) = post!(app, "/addProduct", json!({
        "projectName": "shop",
        "name": "gold",
        "type": "subscription",
        "price": "999",
    }));
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["productId"], "gold");
    assert_eq!(body["data"]["price"], 999);
    assert_eq!(body["data"]["status"], "inactive");
    assert_eq!(body["data"]["frequency"], "monthly");
    assert_eq!(body["data"]["recurring"], false);

    let (status, body) = post!(app, "/addProduct", json!({
        "projectName": "shop", "name": "gold", "type": "one-time", "price": 1,
    }));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "PRODUCT_EXISTS");

    let (_, body) = post!(app, "/addProduct", json!({
        "projectName": "shop", "name": "cheap", "type": "one-time", "price": 0,
    }));
    assert_eq!(body["errorCode"], "INVALID_PRICE");

    let (_, body) = post!(app, "/addProduct", json!({
        "projectName": "shop", "name": "odd", "type": "lifetime", "price": 5,
    }));
    assert_eq!(body["errorCode"], "INVALID_TYPE");

    let (status, body) = post!(app, "/updateProduct", json!({
        "projectName": "shop", "productId": "gold", "updates": {"status": "active", "price": 1299},
    }));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["price"], 1299);

    let (_, body) = post!(app, "/updateProduct", json!({
        "projectName": "shop", "productId": "gold", "updates": {},
    }));
    assert_eq!(body["errorCode"], "NO_UPDATES");

    let (_, body) = post!(app, "/updateProduct", json!({
        "projectName": "shop", "productId": "gold", "updates": {"productId": "other"},
    }));
    assert_eq!(body["errorCode"], "INVALID_UPDATES");

    let (status, body) = post!(app, "/updateProduct", json!({
        "projectName": "shop", "productId": "silver", "updates": {"price": 5},
    }));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorCode"], "PRODUCT_NOT_FOUND");

    let (_, body) = post!(app, "/getProducts", json!({"projectName": "shop"}));
    let products = body["data"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["id"], "gold");

    let (status, _) = post!(app, "/deleteProduct", json!({"projectName": "shop", "productId": "gold"}));
    assert_eq!(status, StatusCode::OK);
    let (status, body) = post!(app, "/deleteProduct", json!({"projectName": "shop", "productId": "gold"}));
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorCode"], "PRODUCT_NOT_FOUND");
}

#[actix_web::test]
async fn purchase_flow_over_http() {
    let env = support::memory_env(PurchaseOrdering::AuthorizeFirst);
    let app = app!(env);
    support::seed_project(&env.state, "shop").await;
    support::seed_product(&env.state, "shop", "sword", "one-time", 500).await;
    support::seed_product(&env.state, "shop", "gold", "subscription", 999).await;

    let (status, body) = post!(app, "/validateItemForPurchase", json!({
        "projectName": "shop", "productId": "sword", "userId": "u1",
    }));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "sword");
    assert_eq!(body["data"]["type"], "one-time");
    assert_eq!(body["data"]["price"], 500);

    let (status, body) = post!(app, "/processPurchase", json!({
        "projectName": "shop",
        "userId": "u1",
        "productId": "sword",
        "paymentMethod": "card",
        "cardData": {"cardNumber": "4111111111111111", "expiry": "12/99", "cvv": "123", "name": "A B"},
        "country": "de",
    }));
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["cardLastFour"], "1111");
    assert_eq!(body["data"]["country"], "DE");
    assert!(body["data"]["paymentId"].as_str().unwrap().starts_with("pay_"));
    assert!(!body.to_string().contains("4111111111111111"));

    let (status, body) = post!(app, "/processPurchase", json!({
        "projectName": "shop",
        "userId": "u1",
        "productId": "sword",
        "paymentMethod": "card",
        "cardData": {"cardNumber": "4111111111111111", "expiry": "12/99", "cvv": "123", "name": "A B"},
    }));
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "ALREADY_PURCHASED");
    assert_eq!(body["retryable"], false);

    let (_, body) = post!(app, "/validateItemForPurchase", json!({
        "projectName": "shop", "productId": "sword", "userId": "u1",
    }));
    assert_eq!(body["errorCode"], "ALREADY_PURCHASED");

    let (_, body) = post!(app, "/checkUserPurchased", json!({
        "projectName": "shop", "productId": "sword", "userId": "u1",
    }));
    assert_eq!(body["data"]["purchased"], true);
    assert_eq!(body["data"]["purchaseData"]["cardLastFour"], "1111");
    assert_eq!(body["data"]["purchaseData"]["amount"], 500);

    let (_, body) = post!(app, "/checkUserPurchased", json!({
        "projectName": "shop", "productId": "sword", "userId": "u2",
    }));
    assert_eq!(body["data"]["purchased"], false);
    assert!(body["data"]["purchaseData"].is_null());

    let (_, body) = post!(app, "/processPurchase", json!({
        "projectName": "shop",
        "userId": "u1",
        "productId": "gold",
        "paymentMethod": "paypal",
        "paypalData": {"email": "not-an-email"},
    }));
    assert_eq!(body["errorCode"], "INVALID_PAYPAL_EMAIL");

    let (_, body) = post!(app, "/processPurchase", json!({
        "projectName": "shop",
        "userId": "u1",
        "productId": "gold",
        "paymentMethod": "paypal",
        "paypalData": {"email": support::DECLINED_PAYPAL},
    }));
    assert_eq!(body["errorCode"], "PAYPAL_DECLINED");
    assert!(body["reason"].is_string());

    let (status, _) = post!(app, "/processPurchase", json!({
        "projectName": "shop",
        "userId": "u1",
        "productId": "gold",
        "paymentMethod": "paypal",
        "paypalData": {"email": "u1@example.com"},
    }));
    assert_eq!(status, StatusCode::OK);

    let (_, body) = post!(app, "/checkUserSubscribed", json!({
        "projectName": "shop", "productId": "gold", "userId": "u1",
    }));
    assert_eq!(body["data"]["subscribed"], true);
    assert_eq!(body["data"]["subscriptionDetails"]["daysRemaining"], 30);

    let (_, body) = post!(app, "/getUserSummary", json!({"projectName": "shop", "userId": "u1"}));
    assert_eq!(body["data"]["totalPurchases"], 2);
    assert_eq!(body["data"]["activeSubscriptions"], 1);

    let (_, body) = post!(app, "/getPurchases", json!({"projectName": "shop", "userId": "u1"}));
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    let (_, body) = post!(app, "/getSubscriptions", json!({"projectName": "shop"}));
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = post!(app, "/getProjectAnalytics", json!({"projectName": "shop"}));
    assert_eq!(body["data"]["overview"]["totalRevenue"], 1499);
    assert_eq!(body["data"]["overview"]["activeSubscriptions"], 1);
    assert_eq!(body["data"]["breakdown"]["revenueByCountry"]["DE"], 500);
    assert_eq!(body["data"]["breakdown"]["revenueByCountry"]["US"], 999);

    let (_, body) = post!(app, "/getProjectAnalytics", json!({"projectName": "shop", "startDate": "yesterday"}));
    assert_eq!(body["errorCode"], "INVALID_DATE");

    let (status, body) = post!(app, "/cancelSubscription", json!({
        "projectName": "shop", "productId": "gold", "userId": "u1",
    }));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");

    let (_, body) = post!(app, "/checkUserSubscribed", json!({
        "projectName": "shop", "productId": "gold", "userId": "u1",
    }));
    assert_eq!(body["data"]["subscribed"], false);
}

#[actix_web::test]
async fn responses_carry_the_success_envelope() {
    let env = support::memory_env(PurchaseOrdering::AuthorizeFirst);
    let app = app!(env);

    let (_, body) = post!(app, "/initializeProject", json!({"projectName": "shop"}));
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Project initialized successfully");
    let ts = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
}
