//! Role transition planning for the three-way role selector.

use crate::model::{Role, RoleChangePlan, RoleChangeRequest, RoleError, RoleSet};

const LABEL_BOTH: &str = "both Analyst and User Manager";

/// Agreement whose analysts hold basic access instead of the Analyst role.
pub const REVIEW_FILE_AGREEMENT: &str = "review_file";

/// Compute the role delta that moves `current` to `requested`.
///
/// At most one role is added and at most one removed. When neither role is
/// held and both are requested, User Manager is added.
#[must_use]
pub fn plan(current: RoleSet, requested: RoleChangeRequest) -> RoleChangePlan {
    let has_analyst = current.contains(Role::Analyst);
    let has_user_manager = current.contains(Role::UserManager);

    match requested {
        RoleChangeRequest::Both => RoleChangePlan {
            role_to_add: if !has_user_manager {
                Some(Role::UserManager)
            } else if !has_analyst {
                Some(Role::Analyst)
            } else {
                None
            },
            role_to_remove: None,
            confirmation_label: LABEL_BOTH,
        },
        RoleChangeRequest::Analyst => RoleChangePlan {
            role_to_add: (!has_analyst).then_some(Role::Analyst),
            role_to_remove: has_user_manager.then_some(Role::UserManager),
            confirmation_label: Role::Analyst.label(),
        },
        RoleChangeRequest::UserManager => RoleChangePlan {
            role_to_add: (!has_user_manager).then_some(Role::UserManager),
            role_to_remove: has_analyst.then_some(Role::Analyst),
            confirmation_label: Role::UserManager.label(),
        },
    }
}

/// Validate a raw selector value and plan the change.
///
/// # Errors
///
/// Returns `RoleError::InvalidRole` when the value is missing or unrecognized.
pub fn plan_from_form(current: RoleSet, requested: Option<&str>) -> Result<RoleChangePlan, RoleError> {
    let requested = RoleChangeRequest::from_form(requested)?;
    Ok(plan(current, requested))
}

/// Role name to send to the role service for a given agreement.
#[must_use]
pub fn service_role_name(role: Role, agreement_id: &str) -> &'static str {
    if role == Role::Analyst && agreement_id == REVIEW_FILE_AGREEMENT {
        "BasicAgreementAccess"
    } else {
        role.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(roles: &[Role]) -> RoleSet {
        roles.iter().copied().collect()
    }

    #[test]
    fn analyst_to_user_manager_swaps_roles() {
        let p = plan(set(&[Role::Analyst]), RoleChangeRequest::UserManager);
        assert_eq!(p.role_to_add, Some(Role::UserManager));
        assert_eq!(p.role_to_remove, Some(Role::Analyst));
        assert_eq!(p.confirmation_label, "User Manager");
    }

    #[test]
    fn user_manager_to_both_adds_analyst() {
        let p = plan(set(&[Role::UserManager]), RoleChangeRequest::Both);
        assert_eq!(p.role_to_add, Some(Role::Analyst));
        assert_eq!(p.role_to_remove, None);
        assert_eq!(p.confirmation_label, "both Analyst and User Manager");
    }

    #[test]
    fn analyst_to_both_adds_user_manager() {
        let p = plan(set(&[Role::Analyst]), RoleChangeRequest::Both);
        assert_eq!(p.role_to_add, Some(Role::UserManager));
        assert_eq!(p.role_to_remove, None);
    }

    #[test]
    fn both_to_both_is_noop() {
        let p = plan(RoleSet::both(), RoleChangeRequest::Both);
        assert!(p.is_noop());
        assert_eq!(p.confirmation_label, "both Analyst and User Manager");
    }

    #[test]
    fn both_to_analyst_removes_user_manager() {
        let p = plan(RoleSet::both(), RoleChangeRequest::Analyst);
        assert_eq!(p.role_to_add, None);
        assert_eq!(p.role_to_remove, Some(Role::UserManager));
        assert_eq!(p.confirmation_label, "Analyst");
    }

    #[test]
    fn both_to_user_manager_removes_analyst() {
        let p = plan(RoleSet::both(), RoleChangeRequest::UserManager);
        assert_eq!(p.role_to_add, None);
        assert_eq!(p.role_to_remove, Some(Role::Analyst));
    }

    #[test]
    fn same_role_is_noop() {
        assert!(plan(set(&[Role::Analyst]), RoleChangeRequest::Analyst).is_noop());
        assert!(plan(set(&[Role::UserManager]), RoleChangeRequest::UserManager).is_noop());
    }

    #[test]
    fn no_roles_to_both_adds_user_manager_only() {
        let p = plan(RoleSet::empty(), RoleChangeRequest::Both);
        assert_eq!(p.role_to_add, Some(Role::UserManager));
        assert_eq!(p.role_to_remove, None);

        let after = p.apply_to(RoleSet::empty());
        let second = plan(after, RoleChangeRequest::Both);
        assert_eq!(second.role_to_add, Some(Role::Analyst));
        assert_eq!(second.apply_to(after), RoleSet::both());
    }

    #[test]
    fn plans_reach_requested_roles_from_any_non_empty_start() {
        let starts = [set(&[Role::Analyst]), set(&[Role::UserManager]), RoleSet::both()];
        for start in starts {
            assert_eq!(
                plan(start, RoleChangeRequest::Analyst).apply_to(start),
                set(&[Role::Analyst])
            );
            assert_eq!(
                plan(start, RoleChangeRequest::UserManager).apply_to(start),
                set(&[Role::UserManager])
            );
            assert_eq!(plan(start, RoleChangeRequest::Both).apply_to(start), RoleSet::both());
        }
    }

    #[test]
    fn invalid_form_value_is_rejected() {
        let err = plan_from_form(RoleSet::both(), Some("Admin")).unwrap_err();
        assert_eq!(err, RoleError::InvalidRole("Admin".into()));
        assert!(plan_from_form(RoleSet::both(), None).is_err());
        assert!(plan_from_form(RoleSet::both(), Some("Analyst")).is_ok());
    }

    #[test]
    fn review_file_agreement_uses_basic_access() {
        assert_eq!(
            service_role_name(Role::Analyst, REVIEW_FILE_AGREEMENT),
            "BasicAgreementAccess"
        );
        assert_eq!(
            service_role_name(Role::UserManager, REVIEW_FILE_AGREEMENT),
            "UserManager"
        );
        assert_eq!(service_role_name(Role::Analyst, "dsa-0001"), "Analyst");
    }
}
