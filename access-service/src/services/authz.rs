use crate::models::{Action, Principal, ResourceRef};
use crate::services::store::TenancyStore;
use access_core::error::AppError;
use std::sync::Arc;

/// Single authorization chokepoint. Every routine mutation, device command
/// and alert query passes through here; no component bypasses it.
pub struct AuthorizationEngine {
    store: Arc<dyn TenancyStore>,
}

impl AuthorizationEngine {
    pub fn new(store: Arc<dyn TenancyStore>) -> Self {
        Self { store }
    }

    /// Decides whether `principal` may perform `action` on `resource`,
    /// returning the owning organization id on success.
    ///
    /// A principal with no membership in the owning organization gets
    /// `NotFound`, not `Forbidden`: resources they cannot even read must be
    /// indistinguishable from resources that do not exist. `Forbidden` is
    /// reserved for members whose role is below the action's minimum.
    ///
    /// The membership is re-read from the store on every call, so a stale
    /// identity cache can never grant more than a fresh lookup would.
    pub async fn authorize(
        &self,
        principal: &Principal,
        action: Action,
        resource: &ResourceRef,
    ) -> Result<String, AppError> {
        let organization_id = self.store.resolve_owning_organization(resource).await?;

        let membership = self
            .store
            .find_membership(&organization_id, &principal.id)
            .await?;

        match membership {
            None => {
                tracing::debug!(
                    principal_id = %principal.id,
                    organization_id = %organization_id,
                    "No membership; hiding resource"
                );
                Err(AppError::NotFound(anyhow::anyhow!("Resource not found")))
            }
            Some(m) if m.role >= action.required_role() => Ok(organization_id),
            Some(m) => {
                tracing::debug!(
                    principal_id = %principal.id,
                    organization_id = %organization_id,
                    role = ?m.role,
                    action = ?action,
                    "Insufficient role"
                );
                Err(AppError::Forbidden(anyhow::anyhow!(
                    "Action {:?} requires at least the {:?} role",
                    action,
                    action.required_role()
                )))
            }
        }
    }

    /// Platform-wide administration (e.g. the platform alert feed) is
    /// limited to configured platform admins; organization roles do not
    /// apply here.
    pub fn authorize_platform(&self, principal: &Principal) -> Result<(), AppError> {
        if principal.platform_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Platform administration required"
            )))
        }
    }
}
