// src/validation.rs

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::gateway::{CardCredentials, PaymentCredentials, PaypalCredentials};
use crate::models::PaymentMethod;

/// Characters the store cannot accept inside a path segment.
pub const INVALID_SEGMENT_CHARS: [char; 6] = ['.', '#', '$', '[', ']', '/'];

/// Required fields per endpoint.
pub fn required_fields(endpoint: &str) -> Option<&'static [&'static str]> {
    let fields: &'static [&'static str] = match endpoint {
        "initializeProject" => &["projectName"],
        "addProduct" => &["projectName", "name", "type", "price"],
        "updateProduct" => &["projectName", "productId", "updates"],
        "deleteProduct" => &["projectName", "productId"],
        "getProducts" => &["projectName"],
        "validateItemForPurchase" => &["projectName", "productId", "userId"],
        "processPurchase" => &["projectName", "userId", "productId", "paymentMethod"],
        "checkUserPurchased" => &["projectName", "productId", "userId"],
        "checkUserSubscribed" => &["projectName", "productId", "userId"],
        "cancelSubscription" => &["projectName", "productId", "userId"],
        "getPurchases" => &["projectName"],
        "getSubscriptions" => &["projectName"],
        "getUserSummary" => &["projectName", "userId"],
        "getProjectAnalytics" => &["projectName"],
        _ => return None,
    };
    Some(fields)
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Checks the endpoint's required fields, then decodes the body into its request type.
pub fn parse_request<T: DeserializeOwned>(endpoint: &str, body: Value) -> Result<T, ApiError> {
    let Some(fields) = required_fields(endpoint) else {
        return Err(ApiError::internal(
            "INVALID_SCHEMA",
            format!("No validation schema for {endpoint}"),
        ));
    };

    for field in fields {
        if is_missing(body.get(*field)) {
            return Err(ApiError::validation(
                "MISSING_FIELD",
                format!("Missing required field: {field}"),
            ));
        }
    }

    serde_json::from_value(body)
        .map_err(|e| ApiError::validation("INVALID_FIELD", format!("Invalid request body: {e}")))
}

pub fn is_valid_segment(raw: &str) -> bool {
    !raw.trim().is_empty() && !raw.contains(INVALID_SEGMENT_CHARS)
}

pub fn project_name(raw: &str) -> Result<&str, ApiError> {
    if is_valid_segment(raw) {
        Ok(raw)
    } else {
        Err(ApiError::validation(
            "INVALID_PROJECT_NAME",
            "Project name cannot contain any of the following characters: . # $ [ ] /",
        ))
    }
}

pub fn product_id(raw: &str) -> Result<&str, ApiError> {
    if is_valid_segment(raw) {
        Ok(raw)
    } else {
        Err(ApiError::validation(
            "INVALID_PRODUCT_ID",
            "Product id cannot contain any of the following characters: . # $ [ ] /",
        ))
    }
}

pub fn user_id(raw: &str) -> Result<&str, ApiError> {
    if is_valid_segment(raw) {
        Ok(raw)
    } else {
        Err(ApiError::validation(
            "INVALID_USER_ID",
            "User id cannot contain any of the following characters: . # $ [ ] /",
        ))
    }
}

/// Positive integer price in minor units, given as a JSON number or a numeric string.
pub fn price(raw: &Value) -> Result<i64, ApiError> {
    let parsed = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(p) if p > 0 => Ok(p),
        _ => Err(ApiError::validation(
            "INVALID_PRICE",
            "Price must be a positive number greater than 0",
        )),
    }
}

pub fn payment_method(raw: &str) -> Result<PaymentMethod, ApiError> {
    PaymentMethod::parse(raw)
        .ok_or_else(|| ApiError::validation("INVALID_PAYMENT_METHOD", "Invalid payment method"))
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    pub card_number: Option<String>,
    pub expiry: Option<String>,
    pub cvv: Option<String>,
    pub name: Option<String>,
    pub card_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaypalData {
    pub email: Option<String>,
}

fn non_empty(field: Option<&String>) -> Option<&str> {
    field.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// `MM/YY`, valid through the end of the stated month.
fn card_expiry(raw: &str, now: DateTime<Utc>) -> Result<(), ApiError> {
    let bad_format = || ApiError::validation("INVALID_EXPIRY_FORMAT", "Invalid expiry date format");

    let (mm, yy) = raw.split_once('/').ok_or_else(bad_format)?;
    if mm.len() != 2 || yy.len() != 2 || !mm.chars().chain(yy.chars()).all(|c| c.is_ascii_digit()) {
        return Err(bad_format());
    }
    let month: u32 = mm.parse().map_err(|_| bad_format())?;
    let year: i32 = yy.parse::<i32>().map_err(|_| bad_format())? + 2000;
    if !(1..=12).contains(&month) {
        return Err(bad_format());
    }

    if (year, month) < (now.year(), now.month()) {
        return Err(ApiError::validation("CARD_EXPIRED", "Card has expired"));
    }
    Ok(())
}

pub fn card(data: &CardData, now: DateTime<Utc>) -> Result<CardCredentials, ApiError> {
    let (Some(number), Some(expiry), Some(cvv), Some(name)) = (
        non_empty(data.card_number.as_ref()),
        non_empty(data.expiry.as_ref()),
        non_empty(data.cvv.as_ref()),
        non_empty(data.name.as_ref()),
    ) else {
        return Err(ApiError::validation(
            "INVALID_CARD_DATA",
            "Invalid card data - missing required fields",
        ));
    };

    if number.len() != 16 || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::validation("INVALID_CARD_NUMBER", "Invalid card number format"));
    }
    card_expiry(expiry, now)?;
    if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::validation("INVALID_CVV", "Invalid CVV format"));
    }

    Ok(CardCredentials {
        card_number: number.to_string(),
        expiry: expiry.to_string(),
        cvv: cvv.to_string(),
        name: name.to_string(),
        card_type: non_empty(data.card_type.as_ref()).map(str::to_string),
    })
}

/// `local@domain.tld` shape: one `@`, no whitespace, a dot inside the domain.
pub fn is_valid_email(raw: &str) -> bool {
    if raw.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub fn paypal(data: &PaypalData) -> Result<PaypalCredentials, ApiError> {
    let Some(email) = non_empty(data.email.as_ref()) else {
        return Err(ApiError::validation("MISSING_PAYPAL_EMAIL", "PayPal email required"));
    };
    if !is_valid_email(email) {
        return Err(ApiError::validation("INVALID_PAYPAL_EMAIL", "Invalid PayPal email format"));
    }
    Ok(PaypalCredentials {
        email: email.to_string(),
    })
}

/// Resolves the credentials block that matches the chosen method.
pub fn credentials(
    method: PaymentMethod,
    card_data: Option<&CardData>,
    paypal_data: Option<&PaypalData>,
    now: DateTime<Utc>,
) -> Result<PaymentCredentials, ApiError> {
    match method {
        PaymentMethod::Card => {
            let data = card_data.ok_or_else(|| {
                ApiError::validation("MISSING_CARD_DATA", "Card data required for card payments")
            })?;
            Ok(PaymentCredentials::Card(card(data, now)?))
        }
        PaymentMethod::Paypal => {
            let data = paypal_data.ok_or_else(|| {
                ApiError::validation("MISSING_PAYPAL_DATA", "PayPal data required for PayPal payments")
            })?;
            Ok(PaymentCredentials::Paypal(paypal(data)?))
        }
    }
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC).
pub fn date_bound(field: &str, raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ApiError::validation("INVALID_DATE", format!("Invalid {field}: {raw}")))
}
