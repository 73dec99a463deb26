use std::sync::Arc;

use portal_core::model::{Role, RoleSet};
use services::{
    ChangeRoleForm, InMemoryRoleService, RoleCall, RoleChangeError, RoleChangeService,
    StepOutcome,
};

const REQUESTER: &str = "manager@example.com";

fn form(agreement: &str, current: &[&str], requested: &str) -> ChangeRoleForm {
    ChangeRoleForm {
        agreement_id: agreement.to_string(),
        target_email: "ada@example.com".into(),
        target_first_name: "Ada".into(),
        target_last_name: "Lovelace".into(),
        current_roles: RoleSet::from_names(current.iter().copied()),
        fleet_type: None,
        requested: Some(requested.to_string()),
    }
}

fn service(fake: &InMemoryRoleService) -> RoleChangeService {
    RoleChangeService::new(Arc::new(fake.clone()), Arc::new(fake.clone()))
}

#[tokio::test]
async fn switching_roles_removes_before_adding() {
    let fake = InMemoryRoleService::new();
    let outcome = service(&fake)
        .change_role(REQUESTER, form("dsa-42", &["Analyst"], "UserManager"))
        .await
        .unwrap();

    assert_eq!(outcome.removal, StepOutcome::Applied(Role::Analyst));
    assert_eq!(outcome.addition, StepOutcome::Applied(Role::UserManager));
    assert_eq!(
        outcome.confirmation_message().as_deref(),
        Some("Ada Lovelace's role has been changed to User Manager.")
    );

    let calls = fake.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, RoleCall::Remove);
    assert_eq!(calls[0].1.role_name, "Analyst");
    assert_eq!(calls[1].0, RoleCall::Add);
    assert_eq!(calls[1].1.role_name, "UserManager");
    assert_eq!(calls[1].1.email_type, "ROLE_CHANGE");
    assert_eq!(calls[1].1.fleet_type, "default");
    assert_eq!(calls[1].1.user_email, "ada@example.com");
}

#[tokio::test]
async fn review_file_agreement_uses_basic_access_role() {
    let fake = InMemoryRoleService::new();
    let outcome = service(&fake)
        .change_role(REQUESTER, form("review_file", &["UserManager"], "Both"))
        .await
        .unwrap();

    assert_eq!(outcome.removal, StepOutcome::Skipped);
    assert_eq!(outcome.addition, StepOutcome::Applied(Role::Analyst));
    let calls = fake.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.role_name, "BasicAgreementAccess");
    assert_eq!(calls[0].1.fleet_type, "review_file");
    assert_eq!(
        outcome.confirmation_message().as_deref(),
        Some("Ada Lovelace's role has been changed to both Analyst and User Manager.")
    );
}

#[tokio::test]
async fn no_change_makes_no_calls() {
    let fake = InMemoryRoleService::new();
    let outcome = service(&fake)
        .change_role(REQUESTER, form("dsa-42", &["Analyst", "UserManager"], "Both"))
        .await
        .unwrap();
    assert!(outcome.plan.is_noop());
    assert!(outcome.is_complete());
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn failed_add_after_remove_is_inconsistent() {
    let fake = InMemoryRoleService::new();
    fake.fail_on(RoleCall::Add, "role service unavailable");
    let outcome = service(&fake)
        .change_role(REQUESTER, form("dsa-42", &["UserManager"], "Analyst"))
        .await
        .unwrap();

    assert_eq!(outcome.removal, StepOutcome::Applied(Role::UserManager));
    assert!(outcome.addition.is_failed());
    assert!(outcome.is_inconsistent());
    assert!(outcome.confirmation_message().is_none());
    assert_eq!(fake.calls().len(), 2);
}

#[tokio::test]
async fn denied_requester_changes_nothing() {
    let fake = InMemoryRoleService::new();
    fake.deny_permissions();
    let err = service(&fake)
        .change_role(REQUESTER, form("dsa-42", &["Analyst"], "UserManager"))
        .await
        .unwrap_err();
    assert!(matches!(err, RoleChangeError::PermissionDenied { .. }));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn missing_selection_is_rejected() {
    let fake = InMemoryRoleService::new();
    let mut bad = form("dsa-42", &["Analyst"], "Both");
    bad.requested = None;
    let err = service(&fake).change_role(REQUESTER, bad).await.unwrap_err();
    match err {
        RoleChangeError::Validation(inner) => assert_eq!(inner.user_message(), "Select a role"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(fake.calls().is_empty());
}
