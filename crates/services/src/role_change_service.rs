use std::sync::Arc;

use portal_core::model::{Role, RoleChangePlan, RoleChangeRequest, RoleError, RoleSet};
use portal_core::roles::{self, REVIEW_FILE_AGREEMENT};

use crate::clients::{PermissionChecker, PermissionQuery, RoleMutation, RoleMutationClient};
use crate::error::RoleChangeError;

/// Permissions a requester needs to change another user's role.
pub const CHANGE_ROLE_PERMISSIONS: [&str; 2] = [
    "user_management.add_analyst",
    "user_management.add_user_manager",
];

const ROLE_CHANGE_EMAIL_TYPE: &str = "ROLE_CHANGE";
const DEFAULT_FLEET_TYPE: &str = "default";

/// Raw change-role submission, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRoleForm {
    pub agreement_id: String,
    pub target_email: String,
    pub target_first_name: String,
    pub target_last_name: String,
    pub current_roles: RoleSet,
    pub fleet_type: Option<String>,
    pub requested: Option<String>,
}

/// A change-role submission whose selector value is known to be valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRoleChange {
    pub agreement_id: String,
    pub target_email: String,
    pub target_name: String,
    pub current_roles: RoleSet,
    pub fleet_type: String,
    pub requested: RoleChangeRequest,
}

impl ChangeRoleForm {
    /// Check the selector value and fill in the fleet type.
    ///
    /// # Errors
    ///
    /// Returns `RoleError::InvalidRole` when no valid role was selected.
    pub fn validate(self) -> Result<ValidatedRoleChange, RoleError> {
        let requested = RoleChangeRequest::from_form(self.requested.as_deref())?;
        let fleet_type = self.fleet_type.filter(|f| !f.is_empty()).unwrap_or_else(|| {
            if self.agreement_id == REVIEW_FILE_AGREEMENT {
                REVIEW_FILE_AGREEMENT.to_string()
            } else {
                DEFAULT_FLEET_TYPE.to_string()
            }
        });
        Ok(ValidatedRoleChange {
            target_name: format!("{} {}", self.target_first_name, self.target_last_name),
            agreement_id: self.agreement_id,
            target_email: self.target_email,
            current_roles: self.current_roles,
            fleet_type,
            requested,
        })
    }
}

/// Result of one of the two role calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The plan did not need this call.
    Skipped,
    Applied(Role),
    Failed { role: Role, reason: String },
}

impl StepOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, StepOutcome::Applied(_))
    }
}

/// Report of an attempted role change. Removal always runs before addition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChangeOutcome {
    pub target_name: String,
    pub plan: RoleChangePlan,
    pub removal: StepOutcome,
    pub addition: StepOutcome,
}

impl RoleChangeOutcome {
    /// Every planned call succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.removal.is_failed() && !self.addition.is_failed()
    }

    /// One call succeeded and the other failed, leaving roles half-changed.
    #[must_use]
    pub fn is_inconsistent(&self) -> bool {
        (self.removal.is_applied() && self.addition.is_failed())
            || (self.removal.is_failed() && self.addition.is_applied())
    }

    /// Banner text shown after a successful change.
    #[must_use]
    pub fn confirmation_message(&self) -> Option<String> {
        self.is_complete().then(|| {
            format!(
                "{}'s role has been changed to {}.",
                self.target_name, self.plan.confirmation_label
            )
        })
    }
}

/// Plans role changes and applies them through the role service.
#[derive(Clone)]
pub struct RoleChangeService {
    roles: Arc<dyn RoleMutationClient>,
    permissions: Arc<dyn PermissionChecker>,
}

impl RoleChangeService {
    #[must_use]
    pub fn new(roles: Arc<dyn RoleMutationClient>, permissions: Arc<dyn PermissionChecker>) -> Self {
        Self { roles, permissions }
    }

    /// Plan without touching any service.
    ///
    /// # Errors
    ///
    /// Returns `RoleChangeError::Validation` when no valid role was selected.
    pub fn preview(&self, form: ChangeRoleForm) -> Result<RoleChangePlan, RoleChangeError> {
        let change = form.validate()?;
        Ok(roles::plan(change.current_roles, change.requested))
    }

    /// Validate, authorize, plan, then remove and add roles as needed.
    ///
    /// Failures of the role calls are reported in the outcome, not as errors.
    ///
    /// # Errors
    ///
    /// Returns `RoleChangeError` if validation fails or the requester lacks
    /// permission; no role is changed in that case.
    pub async fn change_role(
        &self,
        requester_email: &str,
        form: ChangeRoleForm,
    ) -> Result<RoleChangeOutcome, RoleChangeError> {
        let change = form.validate().inspect_err(|err| {
            tracing::info!(error = %err, "role change rejected");
        })?;
        let span = tracing::info_span!(
            "change_role",
            agreement_id = %change.agreement_id,
            requested = %change.requested,
        );
        let _guard = span.enter();

        let query = PermissionQuery {
            permissions_required: CHANGE_ROLE_PERMISSIONS.iter().map(|p| (*p).to_string()).collect(),
            agreement_id: Some(change.agreement_id.clone()),
            user_email: requester_email.to_string(),
            target_user: Some(change.target_email.clone()),
        };
        let allowed = self
            .permissions
            .has_permissions(&query)
            .await
            .map_err(RoleChangeError::PermissionCheck)?;
        if !allowed {
            tracing::warn!("requesting user does not have permission to change user role");
            return Err(RoleChangeError::PermissionDenied {
                agreement_id: change.agreement_id,
                target: change.target_email,
            });
        }

        let plan = roles::plan(change.current_roles, change.requested);
        tracing::info!(
            add = ?plan.role_to_add,
            remove = ?plan.role_to_remove,
            "role changes planned"
        );

        let removal = match plan.role_to_remove {
            Some(role) => {
                let mutation = self.mutation(&change, role);
                self.apply(role, self.roles.remove_role(&mutation).await)
            }
            None => StepOutcome::Skipped,
        };
        let addition = match plan.role_to_add {
            Some(role) => {
                let mutation = self.mutation(&change, role);
                self.apply(role, self.roles.add_role(&mutation).await)
            }
            None => StepOutcome::Skipped,
        };

        let outcome = RoleChangeOutcome {
            target_name: change.target_name,
            plan,
            removal,
            addition,
        };
        if outcome.is_inconsistent() {
            tracing::error!(
                removal = ?outcome.removal,
                addition = ?outcome.addition,
                "role change partially applied; manual reconciliation needed"
            );
        } else if outcome.is_complete() {
            tracing::info!("role change applied");
        }
        Ok(outcome)
    }

    fn mutation(&self, change: &ValidatedRoleChange, role: Role) -> RoleMutation {
        RoleMutation {
            user_email: change.target_email.clone(),
            agreement_id: change.agreement_id.clone(),
            role_name: roles::service_role_name(role, &change.agreement_id).to_string(),
            email_type: ROLE_CHANGE_EMAIL_TYPE,
            fleet_type: change.fleet_type.clone(),
        }
    }

    fn apply(&self, role: Role, result: Result<(), crate::error::ClientError>) -> StepOutcome {
        match result {
            Ok(()) => StepOutcome::Applied(role),
            Err(err) => {
                tracing::warn!(%role, error = %err, "role call failed");
                StepOutcome::Failed {
                    role,
                    reason: err.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(requested: Option<&str>) -> ChangeRoleForm {
        ChangeRoleForm {
            agreement_id: "dsa-0001".into(),
            target_email: "analyst@example.com".into(),
            target_first_name: "Ada".into(),
            target_last_name: "Lovelace".into(),
            current_roles: RoleSet::from_names(["Analyst"]),
            fleet_type: None,
            requested: requested.map(str::to_string),
        }
    }

    #[test]
    fn validate_fills_default_fleet_type() {
        let change = form(Some("Both")).validate().unwrap();
        assert_eq!(change.fleet_type, "default");
        assert_eq!(change.target_name, "Ada Lovelace");

        let mut review = form(Some("Both"));
        review.agreement_id = REVIEW_FILE_AGREEMENT.into();
        assert_eq!(review.validate().unwrap().fleet_type, "review_file");

        let mut existing = form(Some("Both"));
        existing.fleet_type = Some("gpu".into());
        assert_eq!(existing.validate().unwrap().fleet_type, "gpu");
    }

    #[test]
    fn validate_rejects_missing_role() {
        let err = form(None).validate().unwrap_err();
        assert_eq!(err.user_message(), "Select a role");
        assert!(form(Some("Owner")).validate().is_err());
    }

    #[test]
    fn confirmation_only_when_complete() {
        let plan = roles::plan(RoleSet::both(), RoleChangeRequest::Analyst);
        let mut outcome = RoleChangeOutcome {
            target_name: "Ada Lovelace".into(),
            plan,
            removal: StepOutcome::Applied(Role::UserManager),
            addition: StepOutcome::Skipped,
        };
        assert_eq!(
            outcome.confirmation_message().as_deref(),
            Some("Ada Lovelace's role has been changed to Analyst.")
        );
        outcome.removal = StepOutcome::Failed {
            role: Role::UserManager,
            reason: "boom".into(),
        };
        assert!(outcome.confirmation_message().is_none());
        assert!(!outcome.is_inconsistent());
    }
}
