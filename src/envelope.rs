//! Uniform response envelope.
//!
//! Every operation outcome, success or fault, leaves the service as
//! `{ code, message, data }` with HTTP 200. Fault codes come from the fault's structured
//! payload; faults without one collapse to `9000 / "service error"`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult, GENERIC_FAULT_CODE, GENERIC_FAULT_MESSAGE};

pub const SUCCESS_CODE: i32 = 0;
pub const SUCCESS_MESSAGE: &str = "success";

/// Operation
///
/// Identifies the endpoint an outcome belongs to, and through `response_shape` the fields
/// its success payload may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Login,
    Register,
    Logout,
    CurrentUser,
    CreateMenu,
    ListMenus,
}

impl Operation {
    /// Declared output fields. `None` passes the payload through untouched.
    pub fn response_shape(self) -> Option<&'static [&'static str]> {
        match self {
            Operation::Login => Some(&["username", "token"]),
            Operation::Register => Some(&["username"]),
            Operation::CurrentUser => Some(&["id", "username"]),
            Operation::Logout | Operation::CreateMenu | Operation::ListMenus => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Login => "login",
            Operation::Register => "register",
            Operation::Logout => "logout",
            Operation::CurrentUser => "current_user",
            Operation::CreateMenu => "create_menu",
            Operation::ListMenus => "list_menus",
        }
    }
}

/// Envelope
///
/// The wire shape of every response. `data` is `null` for faults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(data),
        }
    }

    /// Maps a fault to its wire form and logs the internal diagnostic.
    pub fn fault(err: &AppError) -> Self {
        if err.is_client_fault() {
            tracing::warn!(error = %err, "request rejected");
        } else {
            tracing::error!(error = %err, "operation failed");
        }

        let (code, message) = err
            .payload()
            .unwrap_or_else(|| (GENERIC_FAULT_CODE, GENERIC_FAULT_MESSAGE.to_string()));
        Self {
            code,
            message,
            data: None,
        }
    }
}

/// normalize
///
/// Wraps an operation outcome. On success the payload is serialized and, when the operation
/// declares a response shape, projected onto exactly those fields.
pub fn normalize<T: Serialize>(op: Operation, outcome: AppResult<T>) -> Envelope<Value> {
    let shaped = outcome.and_then(|data| {
        serde_json::to_value(data)
            .map(|value| shape(value, op.response_shape()))
            .map_err(|e| AppError::Service(format!("{} payload serialization: {e}", op.name())))
    });

    match shaped {
        Ok(value) => Envelope::success(value),
        Err(err) => Envelope::fault(&err),
    }
}

/// Allow-list projection. Only JSON objects are filtered; other payloads pass through.
pub fn shape(value: Value, fields: Option<&[&str]>) -> Value {
    match (value, fields) {
        (Value::Object(mut map), Some(fields)) => {
            map.retain(|key, _| fields.iter().any(|field| *field == key.as_str()));
            Value::Object(map)
        }
        (value, _) => value,
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        // Transport status is always 200; the envelope code carries the outcome.
        (StatusCode::OK, Json(self)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Envelope::<Value>::fault(&self).into_response()
    }
}
