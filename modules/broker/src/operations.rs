//! Broker operations, expressed against the resource API.
//!
//! Every instance operation turns into a CRUD call on the `mobileapps`
//! resource through the server's loopback client, so the broker sees exactly
//! what an external API consumer would see (defaulting, validation, and
//! storage semantics included).

use genapi::loopback::{ClientError, LoopbackClient};
use serde_json::{Value, json};
use thiserror::Error;

use mobileapps::v1alpha1::{self, ClientType, MobileApp};
use mobileapps::{KIND, RESOURCE_PLURAL};

use crate::dto::{BindRequest, BindResponse, Catalog, Plan, ProvisionRequest, Service};

pub const SERVICE_ID: &str = "a3f8f4a6-mobile-app-service";
pub const SERVICE_NAME: &str = "mobile-app";
pub const PLAN_ID: &str = "73ae1b2c-mobile-app-default";
pub const PLAN_NAME: &str = "default";

#[derive(Debug, Error)]
pub enum OpsError {
    #[error("service instance already exists")]
    Conflict,

    #[error("service instance or binding is gone")]
    Gone,

    #[error("service instance not found")]
    NotFound,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Client(ClientError),
}

impl From<ClientError> for OpsError {
    fn from(err: ClientError) -> Self {
        if err.is_already_exists() {
            return Self::Conflict;
        }
        Self::Client(err)
    }
}

/// The broker's behavior behind the HTTP routes.
#[derive(Debug, Clone)]
pub struct BrokerOperations {
    client: LoopbackClient,
}

impl BrokerOperations {
    #[must_use]
    pub fn new(client: LoopbackClient) -> Self {
        Self { client }
    }

    /// The static catalog: one service with one free plan.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        Catalog {
            services: vec![Service {
                id: SERVICE_ID.to_owned(),
                name: SERVICE_NAME.to_owned(),
                description: "Provisions a mobile app configuration".to_owned(),
                bindable: true,
                plans: vec![Plan {
                    id: PLAN_ID.to_owned(),
                    name: PLAN_NAME.to_owned(),
                    description: "Shared default plan".to_owned(),
                    free: true,
                }],
                tags: vec!["mobile".to_owned()],
            }],
        }
    }

    /// Creates the backing app for a new service instance. The instance id
    /// doubles as the object name unless the caller passed one in
    /// `parameters.name`.
    pub async fn provision(
        &self,
        instance_id: &str,
        req: &ProvisionRequest,
    ) -> Result<(), OpsError> {
        if req.service_id != SERVICE_ID {
            return Err(OpsError::InvalidRequest(format!(
                "unknown service_id {:?}",
                req.service_id
            )));
        }
        if req.plan_id != PLAN_ID {
            return Err(OpsError::InvalidRequest(format!(
                "unknown plan_id {:?}",
                req.plan_id
            )));
        }

        let name = req
            .parameters
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(instance_id);
        let client_type = req
            .parameters
            .as_ref()
            .and_then(|p| p.get("clientType"))
            .and_then(Value::as_str)
            .map_or(Ok(ClientType::Cordova), |raw| {
                serde_json::from_value(Value::String(raw.to_owned()))
                    .map_err(|_| OpsError::InvalidRequest(format!("unknown clientType {raw:?}")))
            })?;

        let mut app = MobileApp::new(name, client_type);
        app.metadata
            .labels
            .insert("broker.instance-id".to_owned(), instance_id.to_owned());
        let obj = serde_json::to_value(&app)
            .map_err(|e| OpsError::InvalidRequest(format!("cannot encode {KIND}: {e}")))?;

        self.client
            .create(&v1alpha1::group_version(), RESOURCE_PLURAL, &obj)
            .await?;
        tracing::info!(instance_id = %instance_id, name = %name, "service instance provisioned");
        Ok(())
    }

    /// Deletes the backing app. A missing instance reports gone, which the
    /// route layer renders as a 410.
    pub async fn deprovision(&self, instance_id: &str) -> Result<(), OpsError> {
        match self
            .client
            .delete(&v1alpha1::group_version(), RESOURCE_PLURAL, instance_id)
            .await
        {
            Ok(_) => {
                tracing::info!(instance_id = %instance_id, "service instance deprovisioned");
                Ok(())
            }
            Err(err) if err.is_not_found() => Err(OpsError::Gone),
            Err(err) => Err(err.into()),
        }
    }

    /// Reads the backing app and hands its credentials out as the binding.
    pub async fn bind(
        &self,
        instance_id: &str,
        req: &BindRequest,
    ) -> Result<BindResponse, OpsError> {
        if req.service_id != SERVICE_ID {
            return Err(OpsError::InvalidRequest(format!(
                "unknown service_id {:?}",
                req.service_id
            )));
        }
        let obj = match self
            .client
            .get(&v1alpha1::group_version(), RESOURCE_PLURAL, instance_id)
            .await
        {
            Ok(obj) => obj,
            Err(err) if err.is_not_found() => return Err(OpsError::NotFound),
            Err(err) => return Err(err.into()),
        };

        let api_key = obj
            .pointer("/spec/apiKey")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let name = obj
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or(instance_id);
        Ok(BindResponse {
            credentials: json!({
                "uri": format!("mobctl://{name}"),
                "apiKey": api_key,
            }),
        })
    }

    /// Unbinding only needs the instance to still exist; the binding itself
    /// holds no server-side state.
    pub async fn unbind(&self, instance_id: &str) -> Result<(), OpsError> {
        match self
            .client
            .get(&v1alpha1::group_version(), RESOURCE_PLURAL, instance_id)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Err(OpsError::Gone),
            Err(err) => Err(err.into()),
        }
    }
}
