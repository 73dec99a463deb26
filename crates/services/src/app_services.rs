use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::clients::{
    HttpPermissionChecker, HttpRoleMutationClient, PermissionChecker, RoleMutationClient,
    UnconfiguredClient,
};
use crate::config::PortalConfig;
use crate::error::AppServicesError;
use crate::induction_service::InductionService;
use crate::role_change_service::RoleChangeService;

/// Assembles the portal services from configuration.
#[derive(Clone)]
pub struct AppServices {
    induction: Arc<InductionService>,
    role_changes: Arc<RoleChangeService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the configured HTTP
    /// services.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the question bank cannot be loaded or
    /// storage initialization fails.
    pub async fn new_sqlite(config: &PortalConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let bank = Arc::new(config.load_question_bank()?);
        let storage = Storage::sqlite(&config.db_url).await?;

        let roles: Arc<dyn RoleMutationClient> = match config.role_service_url.clone() {
            Some(url) => Arc::new(HttpRoleMutationClient::new(url)),
            None => {
                tracing::warn!("PORTAL_ROLE_SERVICE_URL not set; role changes will fail");
                Arc::new(UnconfiguredClient)
            }
        };
        let permissions: Arc<dyn PermissionChecker> = match config.permissions_url.clone() {
            Some(url) => Arc::new(HttpPermissionChecker::new(url)),
            None => {
                tracing::warn!("PORTAL_PERMISSIONS_URL not set; permission checks will fail");
                Arc::new(UnconfiguredClient)
            }
        };

        Ok(Self::from_parts(
            InductionService::new(
                clock,
                bank,
                Arc::clone(&storage.induction_states),
                Arc::clone(&storage.induction_attempts),
            )
            .with_ttl(config.induction_ttl),
            RoleChangeService::new(roles, permissions),
        ))
    }

    #[must_use]
    pub fn from_parts(induction: InductionService, role_changes: RoleChangeService) -> Self {
        Self {
            induction: Arc::new(induction),
            role_changes: Arc::new(role_changes),
        }
    }

    #[must_use]
    pub fn induction(&self) -> Arc<InductionService> {
        Arc::clone(&self.induction)
    }

    #[must_use]
    pub fn role_changes(&self) -> Arc<RoleChangeService> {
        Arc::clone(&self.role_changes)
    }
}
