use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::models::{Role, Ward};
use crate::error::IdentityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Staff,
    Guardian,
    Director,
}

impl IdentityKind {
    pub fn prefix(self) -> &'static str {
        match self {
            IdentityKind::Staff => "staff",
            IdentityKind::Guardian => "guardian",
            IdentityKind::Director => "director",
        }
    }
}

/// Routing identity of a user: the realtime room name and the value compared
/// against `sender_id` / `recipient_id`. Serialized as `<kind>_<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalIdentity {
    pub kind: IdentityKind,
    pub id: String,
}

impl LocalIdentity {
    pub fn new(kind: IdentityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn staff(id: impl Into<String>) -> Self {
        Self::new(IdentityKind::Staff, id)
    }

    pub fn guardian(id: impl Into<String>) -> Self {
        Self::new(IdentityKind::Guardian, id)
    }

    pub fn director(id: impl Into<String>) -> Self {
        Self::new(IdentityKind::Director, id)
    }

    /// True when `raw` is the serialized form of this identity.
    pub fn matches(&self, raw: &str) -> bool {
        raw.strip_prefix(self.kind.prefix())
            .and_then(|r| r.strip_prefix('_'))
            .is_some_and(|id| id == self.id)
    }

    /// Derive the identity for `role` from the stored profile.
    pub fn resolve(role: Role, profile: &Profile) -> Result<Self, IdentityError> {
        let field = |value: &Option<String>, name: &'static str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(IdentityError::MissingField { role, field: name })
        };
        match role {
            Role::Teacher => Ok(Self::staff(field(&profile.global_staff_id, "global_staff_id")?)),
            Role::Guardian => Ok(Self::guardian(field(&profile.username, "username")?)),
            Role::Director | Role::Admin => field(&profile.global_staff_id, "global_staff_id")
                .or_else(|_| field(&profile.username, "username"))
                .map(Self::director),
        }
    }
}

impl fmt::Display for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.prefix(), self.id)
    }
}

impl FromStr for LocalIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s.split_once('_').ok_or_else(|| IdentityError::Malformed(s.to_string()))?;
        let kind = match prefix {
            "staff" => IdentityKind::Staff,
            "guardian" => IdentityKind::Guardian,
            "director" => IdentityKind::Director,
            _ => return Err(IdentityError::Malformed(s.to_string())),
        };
        if id.is_empty() {
            return Err(IdentityError::Malformed(s.to_string()));
        }
        Ok(Self::new(kind, id))
    }
}

/// Logged-in profile as stored locally after sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub role: Role,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub global_staff_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Wards of a guardian; empty for staff.
    #[serde(default)]
    pub students: Vec<Ward>,
}

impl Profile {
    pub fn new(role: Role) -> Self {
        Self { role, username: None, global_staff_id: None, display_name: None, students: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_prefix() {
        assert_eq!(LocalIdentity::staff("42").to_string(), "staff_42");
        assert_eq!(LocalIdentity::guardian("jdoe").to_string(), "guardian_jdoe");
    }

    #[test]
    fn parses_and_keeps_underscores_in_id() {
        let id: LocalIdentity = "guardian_j_doe".parse().unwrap();
        assert_eq!(id, LocalIdentity::guardian("j_doe"));
        assert!("teacher_1".parse::<LocalIdentity>().is_err());
        assert!("staff_".parse::<LocalIdentity>().is_err());
        assert!("nobody".parse::<LocalIdentity>().is_err());
    }

    #[test]
    fn matches_only_exact_serialized_form() {
        let me = LocalIdentity::staff("42");
        assert!(me.matches("staff_42"));
        assert!(!me.matches("staff_420"));
        assert!(!me.matches("guardian_42"));
    }

    #[test]
    fn teacher_without_staff_id_cannot_resolve() {
        let mut profile = Profile::new(Role::Teacher);
        profile.username = Some("abebe".into());
        assert_eq!(
            LocalIdentity::resolve(Role::Teacher, &profile),
            Err(IdentityError::MissingField { role: Role::Teacher, field: "global_staff_id" })
        );
        profile.global_staff_id = Some(" 42 ".into());
        assert_eq!(LocalIdentity::resolve(Role::Teacher, &profile).unwrap().to_string(), "staff_42");
    }

    #[test]
    fn director_falls_back_to_username() {
        let mut profile = Profile::new(Role::Director);
        profile.username = Some("principal".into());
        assert_eq!(LocalIdentity::resolve(Role::Director, &profile).unwrap().to_string(), "director_principal");
    }
}
