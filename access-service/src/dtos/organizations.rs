use crate::models::{Membership, Organization, Role};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl From<Organization> for OrganizationResponse {
    fn from(organization: Organization) -> Self {
        Self {
            id: organization.id,
            name: organization.name,
            created_at: organization.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertMemberRequest {
    pub role: Role,
    /// When present, the write only succeeds against this membership
    /// version; omitted means last-write-wins.
    pub expected_version: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub organization_id: String,
    pub principal_id: String,
    pub role: Role,
    pub version: i64,
    pub updated_at: String,
}

impl From<Membership> for MembershipResponse {
    fn from(membership: Membership) -> Self {
        Self {
            organization_id: membership.organization_id,
            principal_id: membership.principal_id,
            role: membership.role,
            version: membership.version,
            updated_at: membership.updated_at.to_rfc3339(),
        }
    }
}
