//! In-process loopback client.
//!
//! Drives the server's own router as a tower service, one request at a time,
//! with no network hop: client and server share a process, so a router
//! snapshot is the loopback "connection". Error responses are decoded back
//! into `Status` fields so callers can branch on the failure reason.

use axum::Router;
use axum::body::Body;
use http::header::CONTENT_TYPE;
use http::{Method, Request};
use serde_json::Value;
use thiserror::Error;
use tower::ServiceExt;

use crate::meta::Status;
use crate::scheme::GroupVersion;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server returned {code} ({reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    #[error("invalid request or response body: {0}")]
    Body(String),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl ClientError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { code: 404, .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Api { code: 409, .. })
    }
}

#[derive(Clone)]
pub struct LoopbackClient {
    router: Router,
}

impl std::fmt::Debug for LoopbackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LoopbackClient")
    }
}

impl LoopbackClient {
    #[must_use]
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    pub async fn create(
        &self,
        gv: &GroupVersion,
        resource: &str,
        obj: &Value,
    ) -> Result<Value, ClientError> {
        self.request(Method::POST, &collection_path(gv, resource), Some(obj))
            .await
    }

    pub async fn get(
        &self,
        gv: &GroupVersion,
        resource: &str,
        name: &str,
    ) -> Result<Value, ClientError> {
        self.request(Method::GET, &object_path(gv, resource, name), None)
            .await
    }

    pub async fn list(&self, gv: &GroupVersion, resource: &str) -> Result<Value, ClientError> {
        self.request(Method::GET, &collection_path(gv, resource), None)
            .await
    }

    pub async fn update(
        &self,
        gv: &GroupVersion,
        resource: &str,
        name: &str,
        obj: &Value,
    ) -> Result<Value, ClientError> {
        self.request(Method::PUT, &object_path(gv, resource, name), Some(obj))
            .await
    }

    pub async fn delete(
        &self,
        gv: &GroupVersion,
        resource: &str,
        name: &str,
    ) -> Result<Value, ClientError> {
        self.request(Method::DELETE, &object_path(gv, resource, name), None)
            .await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(obj) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(obj)?)),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| ClientError::Body(e.to_string()))?;

        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(infallible) => match infallible {},
        };

        let code = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| ClientError::Body(e.to_string()))?;

        if code.is_success() {
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let status: Status = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Status::failure(
                "Unknown",
                String::from_utf8_lossy(&bytes).into_owned(),
                code.as_u16(),
            )
        });
        Err(ClientError::Api {
            code: code.as_u16(),
            reason: status.reason,
            message: status.message,
        })
    }
}

fn collection_path(gv: &GroupVersion, resource: &str) -> String {
    format!("/apis/{}/{}/{}", gv.group, gv.version, resource)
}

fn object_path(gv: &GroupVersion, resource: &str, name: &str) -> String {
    format!("/apis/{}/{}/{}/{}", gv.group, gv.version, resource, name)
}
