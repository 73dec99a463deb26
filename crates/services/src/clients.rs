//! Clients for the external role-mutation and permissions services.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

const ROLE_SERVICE: &str = "role service";
const PERMISSIONS_SERVICE: &str = "permissions service";

/// Payload for a single add or remove role call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleMutation {
    pub user_email: String,
    pub agreement_id: String,
    pub role_name: String,
    pub email_type: &'static str,
    pub fleet_type: String,
}

/// The two independent role operations offered by the role service.
#[async_trait]
pub trait RoleMutationClient: Send + Sync {
    /// # Errors
    ///
    /// Returns `ClientError` if the service rejects or cannot be reached.
    async fn remove_role(&self, mutation: &RoleMutation) -> Result<(), ClientError>;

    /// # Errors
    ///
    /// Returns `ClientError` if the service rejects or cannot be reached.
    async fn add_role(&self, mutation: &RoleMutation) -> Result<(), ClientError>;
}

/// A permission query for one requesting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionQuery {
    pub permissions_required: Vec<String>,
    pub agreement_id: Option<String>,
    pub user_email: String,
    pub target_user: Option<String>,
}

#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// True only when every required permission is granted.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the service cannot be reached.
    async fn has_permissions(&self, query: &PermissionQuery) -> Result<bool, ClientError>;
}

//
// ─── HTTP ──────────────────────────────────────────────────────────────────────
//

fn endpoint(base: &Url, path: &str) -> String {
    format!("{}/{path}", base.as_str().trim_end_matches('/'))
}

#[derive(Clone)]
pub struct HttpRoleMutationClient {
    client: Client,
    base_url: Url,
}

impl HttpRoleMutationClient {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post(&self, path: &str, mutation: &RoleMutation) -> Result<(), ClientError> {
        let url = endpoint(&self.base_url, path);
        tracing::debug!(%url, role = %mutation.role_name, "calling role service");
        let response = self.client.post(url).json(mutation).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::HttpStatus {
                service: ROLE_SERVICE,
                status: response.status(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RoleMutationClient for HttpRoleMutationClient {
    async fn remove_role(&self, mutation: &RoleMutation) -> Result<(), ClientError> {
        self.post("remove-role", mutation).await
    }

    async fn add_role(&self, mutation: &RoleMutation) -> Result<(), ClientError> {
        self.post("add-role", mutation).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Outcome {
    Grant,
    Deny,
}

#[derive(Debug, Deserialize)]
struct PermissionResponse {
    outcome: Outcome,
}

#[derive(Clone)]
pub struct HttpPermissionChecker {
    client: Client,
    base_url: Url,
}

impl HttpPermissionChecker {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn is_granted(&self, action: &str, query: &PermissionQuery) -> Result<bool, ClientError> {
        let mut params = vec![("action", action), ("user", query.user_email.as_str())];
        if let Some(dsa) = query.agreement_id.as_deref() {
            params.push(("dsa", dsa));
        }
        if let Some(target) = query.target_user.as_deref() {
            params.push(("target_user", target));
        }

        let response = self
            .client
            .get(endpoint(&self.base_url, "permissions"))
            .query(&params)
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::OK {
            tracing::info!(action, status = %response.status(), "permission not granted");
            return Ok(false);
        }
        let body: PermissionResponse =
            response
                .json()
                .await
                .map_err(|err| ClientError::UnexpectedResponse {
                    service: PERMISSIONS_SERVICE,
                    reason: err.to_string(),
                })?;
        Ok(matches!(body.outcome, Outcome::Grant))
    }
}

#[async_trait]
impl PermissionChecker for HttpPermissionChecker {
    async fn has_permissions(&self, query: &PermissionQuery) -> Result<bool, ClientError> {
        for action in &query.permissions_required {
            if !self.is_granted(action, query).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Stand-in used when no service URL is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredClient;

#[async_trait]
impl RoleMutationClient for UnconfiguredClient {
    async fn remove_role(&self, _mutation: &RoleMutation) -> Result<(), ClientError> {
        Err(ClientError::NotConfigured {
            service: ROLE_SERVICE,
        })
    }

    async fn add_role(&self, _mutation: &RoleMutation) -> Result<(), ClientError> {
        Err(ClientError::NotConfigured {
            service: ROLE_SERVICE,
        })
    }
}

#[async_trait]
impl PermissionChecker for UnconfiguredClient {
    async fn has_permissions(&self, _query: &PermissionQuery) -> Result<bool, ClientError> {
        Err(ClientError::NotConfigured {
            service: PERMISSIONS_SERVICE,
        })
    }
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Which role call a recorded mutation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleCall {
    Remove,
    Add,
}

/// Recording fake of both external services for tests and local runs.
#[derive(Clone, Default)]
pub struct InMemoryRoleService {
    calls: Arc<Mutex<Vec<(RoleCall, RoleMutation)>>>,
    failures: Arc<Mutex<HashMap<RoleCall, String>>>,
    denied: Arc<Mutex<bool>>,
}

impl InMemoryRoleService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future call of this kind fail with the given reason.
    pub fn fail_on(&self, call: RoleCall, reason: impl Into<String>) {
        if let Ok(mut guard) = self.failures.lock() {
            guard.insert(call, reason.into());
        }
    }

    /// Deny every permission check.
    pub fn deny_permissions(&self) {
        if let Ok(mut guard) = self.denied.lock() {
            *guard = true;
        }
    }

    /// Calls made so far, in order. Failed calls are included.
    #[must_use]
    pub fn calls(&self) -> Vec<(RoleCall, RoleMutation)> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn record(&self, call: RoleCall, mutation: &RoleMutation) -> Result<(), ClientError> {
        let mut calls = self
            .calls
            .lock()
            .map_err(|e| ClientError::Other(e.to_string()))?;
        calls.push((call, mutation.clone()));
        let failures = self
            .failures
            .lock()
            .map_err(|e| ClientError::Other(e.to_string()))?;
        match failures.get(&call) {
            Some(reason) => Err(ClientError::Other(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RoleMutationClient for InMemoryRoleService {
    async fn remove_role(&self, mutation: &RoleMutation) -> Result<(), ClientError> {
        self.record(RoleCall::Remove, mutation)
    }

    async fn add_role(&self, mutation: &RoleMutation) -> Result<(), ClientError> {
        self.record(RoleCall::Add, mutation)
    }
}

#[async_trait]
impl PermissionChecker for InMemoryRoleService {
    async fn has_permissions(&self, _query: &PermissionQuery) -> Result<bool, ClientError> {
        let denied = self
            .denied
            .lock()
            .map_err(|e| ClientError::Other(e.to_string()))?;
        Ok(!*denied)
    }
}
