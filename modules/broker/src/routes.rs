//! Broker HTTP routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;

use crate::dto::{BindRequest, BrokerErrorBody, ProvisionRequest, ProvisionResponse};
use crate::operations::{BrokerOperations, OpsError};

/// Builds the broker route tree. The caller mounts it under whatever prefix
/// the deployment uses; paths here start at `/v2`, per protocol.
pub fn router(ops: Arc<BrokerOperations>) -> Router {
    Router::new()
        .route("/v2/catalog", get(catalog))
        .route(
            "/v2/service_instances/{instance_id}",
            put(provision).delete(deprovision),
        )
        .route(
            "/v2/service_instances/{instance_id}/service_bindings/{binding_id}",
            put(bind).delete(unbind),
        )
        .with_state(ops)
}

fn error_response(err: &OpsError) -> Response {
    match err {
        // the protocol mandates an empty JSON object body for these two
        OpsError::Conflict => (StatusCode::CONFLICT, Json(json!({}))).into_response(),
        OpsError::Gone => (StatusCode::GONE, Json(json!({}))).into_response(),
        OpsError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(BrokerErrorBody {
                error: "NotFound".to_owned(),
                description: err.to_string(),
            }),
        )
            .into_response(),
        OpsError::InvalidRequest(description) => (
            StatusCode::BAD_REQUEST,
            Json(BrokerErrorBody {
                error: "InvalidRequest".to_owned(),
                description: description.clone(),
            }),
        )
            .into_response(),
        OpsError::Client(client) => {
            tracing::error!(error = %client, "broker call against the resource API failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(BrokerErrorBody {
                    error: "InternalError".to_owned(),
                    description: client.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn catalog(State(ops): State<Arc<BrokerOperations>>) -> Response {
    Json(ops.catalog()).into_response()
}

async fn provision(
    State(ops): State<Arc<BrokerOperations>>,
    Path(instance_id): Path<String>,
    Json(req): Json<ProvisionRequest>,
) -> Response {
    match ops.provision(&instance_id, &req).await {
        Ok(()) => (StatusCode::CREATED, Json(ProvisionResponse::default())).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn deprovision(
    State(ops): State<Arc<BrokerOperations>>,
    Path(instance_id): Path<String>,
) -> Response {
    match ops.deprovision(&instance_id).await {
        Ok(()) => (StatusCode::OK, Json(json!({}))).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn bind(
    State(ops): State<Arc<BrokerOperations>>,
    Path((instance_id, binding_id)): Path<(String, String)>,
    Json(req): Json<BindRequest>,
) -> Response {
    tracing::debug!(instance_id = %instance_id, binding_id = %binding_id, "binding requested");
    match ops.bind(&instance_id, &req).await {
        Ok(binding) => (StatusCode::CREATED, Json(binding)).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn unbind(
    State(ops): State<Arc<BrokerOperations>>,
    Path((instance_id, _binding_id)): Path<(String, String)>,
) -> Response {
    match ops.unbind(&instance_id).await {
        Ok(()) => (StatusCode::OK, Json(json!({}))).into_response(),
        Err(err) => error_response(&err),
    }
}
