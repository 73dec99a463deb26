#![forbid(unsafe_code)]

pub mod app_services;
pub mod clients;
pub mod config;
pub mod error;
pub mod induction_service;
pub mod role_change_service;

pub use portal_core::Clock;

pub use app_services::AppServices;
pub use clients::{
    HttpPermissionChecker, HttpRoleMutationClient, InMemoryRoleService, PermissionChecker,
    PermissionQuery, RoleCall, RoleMutation, RoleMutationClient, UnconfiguredClient,
};
pub use config::PortalConfig;
pub use error::{
    AppServicesError, ClientError, ConfigError, InductionServiceError, RoleChangeError,
};
pub use induction_service::{InductionService, QuestionPage};
pub use role_change_service::{
    CHANGE_ROLE_PERMISSIONS, ChangeRoleForm, RoleChangeOutcome, RoleChangeService, StepOutcome,
    ValidatedRoleChange,
};
