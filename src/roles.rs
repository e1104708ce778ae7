//! Role roster: the named participants of a session and their briefs.
//!
//! The default roster is a three-person team: an analyst who turns the
//! customer's request into requirements, an engineer who writes the HTML/JS
//! app, and a product owner who reviews it and signals readiness. The product
//! owner is the reviewer, the only role whose output can carry a candidate
//! artifact.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub const BUSINESS_ANALYST: &str = "BusinessAnalyst";
pub const SOFTWARE_ENGINEER: &str = "SoftwareEngineer";
pub const PRODUCT_OWNER: &str = "ProductOwner";

pub const BUSINESS_ANALYST_BRIEF: &str = r#"You are a Business Analyst. Take the requirements from the user (the customer) and create a project plan for the requested app. Write detailed requirements and a cost estimate. Your documents are the reference the SoftwareEngineer implements against and the checklist the ProductOwner uses to decide whether the delivered application meets every user requirement."#;

pub const SOFTWARE_ENGINEER_BRIEF: &str = r#"You are a Software Engineer. Build a web app using HTML and JavaScript that implements every requirement given by the BusinessAnalyst. Deliver the complete code to the ProductOwner for review when finished, as a single fenced block in the form ```html [code] ```. Ask the BusinessAnalyst to clarify any requirement that is unclear."#;

pub const PRODUCT_OWNER_BRIEF: &str = r#"You are the Product Owner. Review the SoftwareEngineer's code and make sure every user requirement is complete; you are the guardian of quality. The code must be shared in the form ```html [code] ``` so it can be saved and published. When all requirements are met and the code is correctly formatted, repeat the final code in that format and reply with 'READY FOR USER APPROVAL'. If features are missing or the formatting is wrong, send the SoftwareEngineer or BusinessAnalyst a request describing the defect."#;

/// A named participant with a fixed behavioral brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub brief: String,
}

impl Role {
    pub fn new(name: impl Into<String>, brief: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            brief: brief.into(),
        }
    }
}

/// Ordered set of roles plus the designation of the reviewer.
///
/// Order is the rotation order used by [`crate::selection::Rotation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    roles: Vec<Role>,
    reviewer: String,
}

impl Roster {
    /// Build a roster, checking that names are non-empty and unique and that
    /// the reviewer is one of the roles.
    pub fn new(roles: Vec<Role>, reviewer: impl Into<String>) -> Result<Self, ConfigError> {
        let reviewer = reviewer.into();
        if roles.is_empty() {
            return Err(ConfigError::InvalidRoster("roster has no roles".to_string()));
        }
        for (i, role) in roles.iter().enumerate() {
            if role.name.trim().is_empty() {
                return Err(ConfigError::InvalidRoster(format!(
                    "role #{} has an empty name",
                    i + 1
                )));
            }
            if roles[..i].iter().any(|r| r.name == role.name) {
                return Err(ConfigError::InvalidRoster(format!(
                    "duplicate role name '{}'",
                    role.name
                )));
            }
        }
        if !roles.iter().any(|r| r.name == reviewer) {
            return Err(ConfigError::InvalidRoster(format!(
                "reviewer '{}' is not a member of the roster",
                reviewer
            )));
        }
        Ok(Self { roles, reviewer })
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn get(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    /// Position of a role in rotation order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.roles.iter().position(|r| r.name == name)
    }

    pub fn reviewer(&self) -> &Role {
        // Presence is checked in `new`.
        self.get(&self.reviewer).unwrap_or(&self.roles[0])
    }

    pub fn is_reviewer(&self, name: &str) -> bool {
        self.reviewer == name
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            roles: vec![
                Role::new(BUSINESS_ANALYST, BUSINESS_ANALYST_BRIEF),
                Role::new(SOFTWARE_ENGINEER, SOFTWARE_ENGINEER_BRIEF),
                Role::new(PRODUCT_OWNER, PRODUCT_OWNER_BRIEF),
            ],
            reviewer: PRODUCT_OWNER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roster_order_and_reviewer() {
        let roster = Roster::default();
        let names: Vec<&str> = roster.roles().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec![BUSINESS_ANALYST, SOFTWARE_ENGINEER, PRODUCT_OWNER]);
        assert_eq!(roster.reviewer().name, PRODUCT_OWNER);
        assert!(roster.is_reviewer(PRODUCT_OWNER));
        assert!(!roster.is_reviewer(SOFTWARE_ENGINEER));
    }

    #[test]
    fn test_reviewer_brief_mentions_readiness_marker() {
        assert!(PRODUCT_OWNER_BRIEF.contains("READY FOR USER APPROVAL"));
        assert!(PRODUCT_OWNER_BRIEF.contains("```html"));
    }

    #[test]
    fn test_roster_rejects_unknown_reviewer() {
        let err = Roster::new(vec![Role::new("A", "a")], "B").unwrap_err();
        assert!(err.to_string().contains("reviewer 'B'"));
    }

    #[test]
    fn test_roster_rejects_duplicates() {
        let err = Roster::new(vec![Role::new("A", "a"), Role::new("A", "b")], "A").unwrap_err();
        assert!(err.to_string().contains("duplicate role name 'A'"));
    }

    #[test]
    fn test_roster_rejects_empty() {
        assert!(Roster::new(vec![], "A").is_err());
        assert!(Roster::new(vec![Role::new("  ", "x")], "  ").is_err());
    }

    #[test]
    fn test_position_follows_rotation_order() {
        let roster = Roster::default();
        assert_eq!(roster.position(BUSINESS_ANALYST), Some(0));
        assert_eq!(roster.position(PRODUCT_OWNER), Some(2));
        assert_eq!(roster.position("Nobody"), None);
    }
}
