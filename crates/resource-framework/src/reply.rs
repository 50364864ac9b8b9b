//! Successful dispatch results and their HTTP rendering.

use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::task::TaskSnapshot;

/// Where pollable task handles are exposed.
pub const TASKS_URI: &str = "/tasks";

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A JSON representation with an optional `Location` header.
    Json {
        status: StatusCode,
        body: Value,
        location: Option<String>,
    },
    /// `204 No Content`.
    NoContent,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self::Json {
            status: StatusCode::OK,
            body,
            location: None,
        }
    }

    pub fn created(body: Value, location: String) -> Self {
        Self::Json {
            status: StatusCode::CREATED,
            body,
            location: Some(location),
        }
    }

    /// `202 Accepted` pointing at the task that carries on the work.
    pub fn accepted(task: &TaskSnapshot) -> Self {
        Self::Json {
            status: StatusCode::ACCEPTED,
            body: serde_json::to_value(task).unwrap_or(Value::Null),
            location: Some(format!("{TASKS_URI}/{}", task.id)),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Json { status, .. } => *status,
            Self::NoContent => StatusCode::NO_CONTENT,
        }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
            Self::Json {
                status,
                body,
                location,
            } => {
                let mut response = (status, axum::Json(body)).into_response();
                if let Some(value) = location.and_then(|l| HeaderValue::from_str(&l).ok()) {
                    response.headers_mut().insert(LOCATION, value);
                }
                response
            }
        }
    }
}
