use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;

use inapp_purchases::gateway::PaymentCredentials;
use inapp_purchases::models::PaymentMethod;
use inapp_purchases::validation::{self, CardData, PaypalData};

fn card(number: &str, expiry: &str, cvv: &str) -> CardData {
    CardData {
        card_number: Some(number.to_string()),
        expiry: Some(expiry.to_string()),
        cvv: Some(cvv.to_string()),
        name: Some("Jane Doe".to_string()),
        card_type: None,
    }
}

fn code<T: std::fmt::Debug>(result: Result<T, inapp_purchases::error::ApiError>) -> String {
    result.unwrap_err().code().to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Probe {
    project_name: String,
}

#[test]
fn required_fields_treat_null_and_empty_as_missing() {
    for body in [json!({}), json!({"projectName": null}), json!({"projectName": ""})] {
        assert_eq!(code(validation::parse_request::<Probe>("getProducts", body)), "MISSING_FIELD");
    }
    let ok: Probe = validation::parse_request("getProducts", json!({"projectName": "shop"})).unwrap();
    assert_eq!(ok.project_name, "shop");

    assert_eq!(code(validation::parse_request::<Probe>("getProducts", json!({"projectName": 7}))), "INVALID_FIELD");
    assert_eq!(code(validation::parse_request::<Probe>("noSuchEndpoint", json!({}))), "INVALID_SCHEMA");
}

#[test]
fn path_segments_reject_reserved_characters() {
    for bad in ["a.b", "a#b", "a$b", "a[b", "a]b", "a/b", "", "   "] {
        assert!(!validation::is_valid_segment(bad), "{bad:?}");
    }
    assert!(validation::is_valid_segment("My Project-1"));
    assert_eq!(code(validation::project_name("x/y")), "INVALID_PROJECT_NAME");
    assert_eq!(code(validation::product_id("x.y")), "INVALID_PRODUCT_ID");
    assert_eq!(code(validation::user_id("u$1")), "INVALID_USER_ID");
}

#[test]
fn prices_must_be_positive_integers() {
    assert_eq!(validation::price(&json!(999)).unwrap(), 999);
    assert_eq!(validation::price(&json!(" 250 ")).unwrap(), 250);
    for bad in [json!(0), json!(-5), json!("abc"), json!(9.5), json!(null), json!([1])] {
        assert_eq!(code(validation::price(&bad)), "INVALID_PRICE", "{bad}");
    }
}

#[test]
fn card_checks_run_in_order() {
    let now = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();

    let ok = validation::card(&card("4111111111111111", "06/25", "123"), now).unwrap();
    assert_eq!(ok.last_four(), "1111");

    let mut missing = card("4111111111111111", "12/30", "123");
    missing.name = None;
    assert_eq!(code(validation::card(&missing, now)), "INVALID_CARD_DATA");
    assert_eq!(code(validation::card(&card("4111", "12/30", "123"), now)), "INVALID_CARD_NUMBER");
    assert_eq!(code(validation::card(&card("4111111111111111", "1230", "123"), now)), "INVALID_EXPIRY_FORMAT");
    assert_eq!(code(validation::card(&card("4111111111111111", "13/30", "123"), now)), "INVALID_EXPIRY_FORMAT");
    assert_eq!(code(validation::card(&card("4111111111111111", "05/25", "123"), now)), "CARD_EXPIRED");
    assert_eq!(code(validation::card(&card("4111111111111111", "12/30", "12"), now)), "INVALID_CVV");
    assert!(validation::card(&card("4111111111111111", "12/30", "1234"), now).is_ok());
}

#[test]
fn paypal_email_shape() {
    assert!(validation::is_valid_email("u1@example.com"));
    for bad in ["u1example.com", "u1@", "@example.com", "u1@example", "u 1@example.com", "a@b@c.com"] {
        assert!(!validation::is_valid_email(bad), "{bad}");
    }
    assert_eq!(code(validation::paypal(&PaypalData { email: None })), "MISSING_PAYPAL_EMAIL");
    assert_eq!(
        code(validation::paypal(&PaypalData { email: Some("nope".to_string()) })),
        "INVALID_PAYPAL_EMAIL"
    );
}

#[test]
fn credentials_follow_the_payment_method() {
    let now = Utc::now();
    let card_data = card("4111111111111111", "12/99", "123");
    let paypal_data = PaypalData {
        email: Some("u1@example.com".to_string()),
    };

    assert_eq!(
        code(validation::credentials(PaymentMethod::Card, None, Some(&paypal_data), now)),
        "MISSING_CARD_DATA"
    );
    assert_eq!(
        code(validation::credentials(PaymentMethod::Paypal, Some(&card_data), None, now)),
        "MISSING_PAYPAL_DATA"
    );

    match validation::credentials(PaymentMethod::Paypal, Some(&card_data), Some(&paypal_data), now).unwrap() {
        PaymentCredentials::Paypal(pp) => assert_eq!(pp.email, "u1@example.com"),
        other => panic!("expected paypal credentials, got {other:?}"),
    }
    assert_eq!(code(validation::payment_method("bitcoin")), "INVALID_PAYMENT_METHOD");
}
