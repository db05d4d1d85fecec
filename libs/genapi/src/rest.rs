//! REST route handlers for installed resources.
//!
//! One router per resource, dispatching the standard verbs to the resource's
//! [`RestStorage`] backend. Failures are served as `Status` objects with the
//! matching HTTP code, the same shape a client sees from any group.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use crate::codec::{CodecError, CodecFactory};
use crate::meta::Status;
use crate::scheme::GroupVersionKind;
use crate::storage::{RestStorage, StorageError};

/// Everything a resource's handlers need, shared via router state.
pub(crate) struct ResourceCtx {
    pub storage: Arc<dyn RestStorage>,
    pub codecs: CodecFactory,
    pub gvk: GroupVersionKind,
    pub resource: String,
}

/// Builds the router serving one resource under the standard path convention
/// `/apis/<group>/<version>/<resource>`.
pub(crate) fn resource_router(ctx: Arc<ResourceCtx>) -> Router {
    let base = format!(
        "/apis/{}/{}/{}",
        ctx.gvk.group, ctx.gvk.version, ctx.resource
    );
    Router::new()
        .route(&base, get(list_resource).post(create_resource))
        .route(
            &format!("{base}/{{name}}"),
            get(get_resource)
                .put(update_resource)
                .delete(delete_resource),
        )
        .with_state(ctx)
}

pub(crate) fn status_response(code: StatusCode, reason: &str, message: String) -> Response {
    let status = Status::failure(reason, message, code.as_u16());
    (code, Json(status)).into_response()
}

fn storage_error_response(e: &StorageError) -> Response {
    let (code, reason) = match e {
        StorageError::NotFound { .. } => (StatusCode::NOT_FOUND, "NotFound"),
        StorageError::AlreadyExists { .. } => (StatusCode::CONFLICT, "AlreadyExists"),
        StorageError::InvalidObject(_) => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid"),
        StorageError::Backend(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
    };
    if code.is_server_error() {
        tracing::error!(error = %e, "storage backend failure");
    }
    status_response(code, reason, e.to_string())
}

fn codec_error_response(e: &CodecError) -> Response {
    let (code, reason) = match e {
        CodecError::Invalid { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid"),
        CodecError::UnknownKind(_) | CodecError::MissingTypeMeta | CodecError::Serde(_) => {
            (StatusCode::BAD_REQUEST, "BadRequest")
        }
    };
    status_response(code, reason, e.to_string())
}

async fn list_resource(State(ctx): State<Arc<ResourceCtx>>) -> Response {
    match ctx.storage.list().await {
        Ok(items) => {
            let list = json!({
                "apiVersion": ctx.gvk.group_version().api_version(),
                "kind": format!("{}List", ctx.gvk.kind),
                "metadata": {},
                "items": items,
            });
            Json(list).into_response()
        }
        Err(e) => storage_error_response(&e),
    }
}

async fn get_resource(
    State(ctx): State<Arc<ResourceCtx>>,
    Path(name): Path<String>,
) -> Response {
    match ctx.storage.get(&name).await {
        Ok(obj) => Json(obj).into_response(),
        Err(e) => storage_error_response(&e),
    }
}

async fn create_resource(State(ctx): State<Arc<ResourceCtx>>, body: Bytes) -> Response {
    let (gvk, mut obj) = match ctx.codecs.decode(&body) {
        Ok(decoded) => decoded,
        Err(e) => return codec_error_response(&e),
    };
    if gvk != ctx.gvk {
        return status_response(
            StatusCode::BAD_REQUEST,
            "BadRequest",
            format!("expected {}, got {gvk}", ctx.gvk),
        );
    }
    if let Err(e) = ctx.codecs.validate(&gvk, &obj) {
        return codec_error_response(&e);
    }

    let Some(name) = object_name(&obj) else {
        return status_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid",
            "metadata.name must not be empty".to_owned(),
        );
    };
    fill_create_meta(&mut obj);

    match ctx.storage.create(obj).await {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(e) => {
            tracing::debug!(resource = %ctx.resource, name = %name, error = %e, "create rejected");
            storage_error_response(&e)
        }
    }
}

async fn update_resource(
    State(ctx): State<Arc<ResourceCtx>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let (gvk, obj) = match ctx.codecs.decode(&body) {
        Ok(decoded) => decoded,
        Err(e) => return codec_error_response(&e),
    };
    if gvk != ctx.gvk {
        return status_response(
            StatusCode::BAD_REQUEST,
            "BadRequest",
            format!("expected {}, got {gvk}", ctx.gvk),
        );
    }
    if let Err(e) = ctx.codecs.validate(&gvk, &obj) {
        return codec_error_response(&e);
    }
    if object_name(&obj).as_deref() != Some(name.as_str()) {
        return status_response(
            StatusCode::BAD_REQUEST,
            "BadRequest",
            format!("metadata.name does not match the request path {name:?}"),
        );
    }

    match ctx.storage.update(&name, obj).await {
        Ok(stored) => Json(stored).into_response(),
        Err(e) => storage_error_response(&e),
    }
}

async fn delete_resource(
    State(ctx): State<Arc<ResourceCtx>>,
    Path(name): Path<String>,
) -> Response {
    match ctx.storage.delete(&name).await {
        Ok(deleted) => Json(deleted).into_response(),
        Err(e) => storage_error_response(&e),
    }
}

fn object_name(obj: &Value) -> Option<String> {
    obj.pointer("/metadata/name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
}

/// Server-assigned object identity, set once at create time.
fn fill_create_meta(obj: &mut Value) {
    if let Some(meta) = obj.pointer_mut("/metadata").and_then(Value::as_object_mut) {
        meta.entry("uid")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        meta.entry("creationTimestamp")
            .or_insert_with(|| json!(chrono::Utc::now()));
    }
}
