//! Broker surface exercised end to end: every broker call below runs through
//! the loopback client into a real resource API assembled in-process.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use broker::{BrokerOperations, router};
use genapi::codec::CodecFactory;
use genapi::config::GenericConfig;
use genapi::meta;
use genapi::scheme::SchemeBuilder;
use genapi::server::{ApiGroupInfo, GenericApiServer};
use genapi::storage::StorageOptions;
use http::header::CONTENT_TYPE;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

fn build_broker_router() -> (Router, Router) {
    let mut builder = SchemeBuilder::new();
    meta::install_unversioned(&mut builder);
    mobileapps::install(&mut builder);
    let scheme = builder.build();
    let codecs = CodecFactory::new(scheme.clone());

    let config = GenericConfig::new(StorageOptions::default()).complete();
    let mut server = GenericApiServer::new(config).expect("server");

    let storage = mobileapps::MobileAppStorage::new(scheme, server.rest_options())
        .expect("mobileapps storage");
    let mut group = ApiGroupInfo::new(mobileapps::v1alpha1::group_version(), codecs);
    group.add_resource(mobileapps::RESOURCE_PLURAL, Arc::new(storage));
    server.install_api_group(group).expect("install group");

    let client = server.loopback_client().expect("loopback client");
    let ops = Arc::new(BrokerOperations::new(client));
    (router(ops), server.router())
}

async fn send(
    router: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(path);
    let request = match body {
        Some(value) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn provision_body() -> Value {
    json!({
        "service_id": broker::operations::SERVICE_ID,
        "plan_id": broker::operations::PLAN_ID,
        "parameters": {"clientType": "android"}
    })
}

fn bind_body() -> Value {
    json!({
        "service_id": broker::operations::SERVICE_ID,
        "plan_id": broker::operations::PLAN_ID
    })
}

#[tokio::test]
async fn catalog_lists_the_mobile_app_service() {
    let (broker, _) = build_broker_router();
    let (status, body) = send(&broker, Method::GET, "/v2/catalog", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"][0]["name"], "mobile-app");
    assert_eq!(body["services"][0]["bindable"], true);
    assert_eq!(body["services"][0]["plans"][0]["free"], true);
}

#[tokio::test]
async fn provision_creates_the_backing_app() {
    let (broker, api) = build_broker_router();

    let (status, _) = send(
        &broker,
        Method::PUT,
        "/v2/service_instances/inst-1",
        Some(provision_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // the instance is a real resource on the API side
    let (status, app) = send(
        &api,
        Method::GET,
        "/apis/mobile.mobctl.dev/v1alpha1/mobileapps/inst-1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app["spec"]["clientType"], "android");
    assert_eq!(app["metadata"]["labels"]["broker.instance-id"], "inst-1");
    assert!(!app["spec"]["apiKey"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn provision_twice_conflicts() {
    let (broker, _) = build_broker_router();

    let path = "/v2/service_instances/inst-1";
    let (first, _) = send(&broker, Method::PUT, path, Some(provision_body())).await;
    assert_eq!(first, StatusCode::CREATED);

    let (second, body) = send(&broker, Method::PUT, path, Some(provision_body())).await;
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn provision_rejects_unknown_plan() {
    let (broker, _) = build_broker_router();

    let (status, body) = send(
        &broker,
        Method::PUT,
        "/v2/service_instances/inst-1",
        Some(json!({
            "service_id": broker::operations::SERVICE_ID,
            "plan_id": "no-such-plan"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidRequest");
}

#[tokio::test]
async fn deprovision_then_gone() {
    let (broker, _) = build_broker_router();

    let path = "/v2/service_instances/inst-1";
    send(&broker, Method::PUT, path, Some(provision_body())).await;

    let (status, body) = send(&broker, Method::DELETE, path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (status, body) = send(&broker, Method::DELETE, path, None).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn bind_returns_the_app_credentials() {
    let (broker, _) = build_broker_router();

    send(
        &broker,
        Method::PUT,
        "/v2/service_instances/inst-1",
        Some(provision_body()),
    )
    .await;

    let (status, body) = send(
        &broker,
        Method::PUT,
        "/v2/service_instances/inst-1/service_bindings/bind-1",
        Some(bind_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["credentials"]["uri"], "mobctl://inst-1");
    assert!(!body["credentials"]["apiKey"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn bind_missing_instance_is_not_found() {
    let (broker, _) = build_broker_router();

    let (status, body) = send(
        &broker,
        Method::PUT,
        "/v2/service_instances/ghost/service_bindings/bind-1",
        Some(bind_body()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn unbind_after_deprovision_is_gone() {
    let (broker, _) = build_broker_router();

    let instance = "/v2/service_instances/inst-1";
    send(&broker, Method::PUT, instance, Some(provision_body())).await;

    let binding = "/v2/service_instances/inst-1/service_bindings/bind-1";
    let (status, _) = send(&broker, Method::DELETE, binding, None).await;
    assert_eq!(status, StatusCode::OK);

    send(&broker, Method::DELETE, instance, None).await;
    let (status, _) = send(&broker, Method::DELETE, binding, None).await;
    assert_eq!(status, StatusCode::GONE);
}
