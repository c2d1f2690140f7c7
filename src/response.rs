// src/response.rs

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `{ success: true, message, data?, timestamp }`
pub fn success<T: Serialize>(message: &str, data: Option<T>) -> HttpResponse {
    success_with_status(StatusCode::OK, message, data)
}

pub fn created<T: Serialize>(message: &str, data: T) -> HttpResponse {
    success_with_status(StatusCode::CREATED, message, Some(data))
}

pub fn success_with_status<T: Serialize>(status: StatusCode, message: &str, data: Option<T>) -> HttpResponse {
    let mut body = json!({
        "success": true,
        "message": message,
        "timestamp": timestamp(),
    });
    if let Some(data) = data {
        match serde_json::to_value(data) {
            Ok(value) => body["data"] = value,
            Err(e) => {
                log::error!("response serialization error: {e}");
                return HttpResponse::InternalServerError().finish();
            }
        }
    }
    HttpResponse::build(status).json(body)
}

pub fn message(message: &str) -> HttpResponse {
    success::<()>(message, None)
}
