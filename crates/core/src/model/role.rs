use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoleError {
    #[error("invalid role requested: {0:?}")]
    InvalidRole(String),
}

impl RoleError {
    /// Message shown next to the role selector.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            RoleError::InvalidRole(_) => "Select a role",
        }
    }
}

//
// ─── ROLE ──────────────────────────────────────────────────────────────────────
//

/// A capability grant a user can hold within an agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Data access through the platform.
    Analyst,
    /// Can add and manage other users.
    UserManager,
}

impl Role {
    /// Name used by the role and permissions services.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Analyst => "Analyst",
            Role::UserManager => "UserManager",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Role::Analyst => "Analyst",
            Role::UserManager => "User Manager",
        }
    }

    /// Parse a service role name, returning `None` for roles this portal
    /// does not manage.
    #[must_use]
    pub fn from_service_name(name: &str) -> Option<Self> {
        match name {
            "Analyst" | "BasicAgreementAccess" => Some(Role::Analyst),
            "UserManager" => Some(Role::UserManager),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── ROLE SET ──────────────────────────────────────────────────────────────────
//

/// The roles a user currently holds. Each role appears at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleSet {
    analyst: bool,
    user_manager: bool,
}

impl RoleSet {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn both() -> Self {
        Self {
            analyst: true,
            user_manager: true,
        }
    }

    /// Build from service role names; unknown names are ignored.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(|name| Role::from_service_name(name.as_ref()))
            .collect()
    }

    #[must_use]
    pub fn contains(self, role: Role) -> bool {
        match role {
            Role::Analyst => self.analyst,
            Role::UserManager => self.user_manager,
        }
    }

    #[must_use]
    pub fn with(mut self, role: Role) -> Self {
        match role {
            Role::Analyst => self.analyst = true,
            Role::UserManager => self.user_manager = true,
        }
        self
    }

    #[must_use]
    pub fn without(mut self, role: Role) -> Self {
        match role {
            Role::Analyst => self.analyst = false,
            Role::UserManager => self.user_manager = false,
        }
        self
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        !self.analyst && !self.user_manager
    }

    pub fn iter(self) -> impl Iterator<Item = Role> {
        [Role::Analyst, Role::UserManager]
            .into_iter()
            .filter(move |role| self.contains(*role))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<T: IntoIterator<Item = Role>>(iter: T) -> Self {
        iter.into_iter().fold(RoleSet::empty(), RoleSet::with)
    }
}

//
// ─── REQUEST & PLAN ────────────────────────────────────────────────────────────
//

/// The three-way role selector value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleChangeRequest {
    Analyst,
    UserManager,
    Both,
}

impl RoleChangeRequest {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RoleChangeRequest::Analyst => "Analyst",
            RoleChangeRequest::UserManager => "UserManager",
            RoleChangeRequest::Both => "Both",
        }
    }

    /// Validate an optional form value.
    ///
    /// # Errors
    ///
    /// Returns `RoleError::InvalidRole` when the value is missing or unrecognized.
    pub fn from_form(value: Option<&str>) -> Result<Self, RoleError> {
        value
            .ok_or_else(|| RoleError::InvalidRole(String::new()))?
            .parse()
    }
}

impl FromStr for RoleChangeRequest {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Analyst" => Ok(RoleChangeRequest::Analyst),
            "UserManager" => Ok(RoleChangeRequest::UserManager),
            "Both" => Ok(RoleChangeRequest::Both),
            other => Err(RoleError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for RoleChangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal role delta for a requested change, with the confirmation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleChangePlan {
    pub role_to_add: Option<Role>,
    pub role_to_remove: Option<Role>,
    pub confirmation_label: &'static str,
}

impl RoleChangePlan {
    /// True when nothing needs to change.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.role_to_add.is_none() && self.role_to_remove.is_none()
    }

    /// Roles the user would hold once both steps succeed.
    #[must_use]
    pub fn apply_to(&self, current: RoleSet) -> RoleSet {
        let after_remove = self
            .role_to_remove
            .map_or(current, |role| current.without(role));
        self.role_to_add
            .map_or(after_remove, |role| after_remove.with(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_set_from_names_ignores_unknown() {
        let set = RoleSet::from_names(["Analyst", "DataController", "Analyst"]);
        assert!(set.contains(Role::Analyst));
        assert!(!set.contains(Role::UserManager));
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    fn basic_agreement_access_counts_as_analyst() {
        let set = RoleSet::from_names(["BasicAgreementAccess"]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Role::Analyst]);
    }

    #[test]
    fn role_set_with_without() {
        let set = RoleSet::empty().with(Role::UserManager);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Role::UserManager]);
        assert!(set.without(Role::UserManager).is_empty());
        assert_eq!(RoleSet::both().iter().count(), 2);
    }

    #[test]
    fn request_parsing() {
        assert_eq!("Both".parse::<RoleChangeRequest>(), Ok(RoleChangeRequest::Both));
        assert_eq!(
            "both".parse::<RoleChangeRequest>(),
            Err(RoleError::InvalidRole("both".into()))
        );
        let missing = RoleChangeRequest::from_form(None).unwrap_err();
        assert_eq!(missing.user_message(), "Select a role");
    }

    #[test]
    fn labels() {
        assert_eq!(Role::UserManager.label(), "User Manager");
        assert_eq!(Role::UserManager.as_str(), "UserManager");
        assert_eq!(Role::Analyst.to_string(), "Analyst");
    }
}
