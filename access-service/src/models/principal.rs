use crate::models::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stored identity record. Principals are created on first successful
/// credential verification and soft-disabled rather than deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub display_name: String,
    pub disabled: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl PrincipalRecord {
    pub fn new(id: String, display_name: String) -> Self {
        Self {
            id,
            display_name,
            disabled: false,
            created_at: Utc::now(),
        }
    }
}

/// Resolved principal carried through a request: the verified identity plus
/// its organization memberships at resolution time.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub display_name: String,
    pub platform_admin: bool,
    pub memberships: HashMap<String, Role>,
}

impl Principal {
    pub fn role_in(&self, organization_id: &str) -> Option<Role> {
        self.memberships.get(organization_id).copied()
    }
}
