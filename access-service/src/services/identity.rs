use crate::models::{Principal, PrincipalRecord};
use crate::services::store::TenancyStore;
use access_core::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identity established by the external credential provider.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub display_name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// External identity-provider seam. The core never parses provider token
/// formats beyond this single call.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AppError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    name: Option<String>,
    exp: i64,
}

/// HS256 bearer-token verifier over `jsonwebtoken`, expiry-checked.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &Secret<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AppError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                AppError::Unauthenticated(anyhow::anyhow!("Token verification failed: {}", e))
            })?;

        let expires_at = Utc
            .timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or_else(|| AppError::Unauthenticated(anyhow::anyhow!("Token expiry out of range")))?;

        Ok(VerifiedIdentity {
            subject_id: data.claims.sub,
            display_name: data.claims.name,
            expires_at,
        })
    }
}

struct CachedPrincipal {
    principal: Principal,
    cached_at: Instant,
    token_expires_at: DateTime<Utc>,
}

/// Turns an opaque bearer credential into a verified principal with its
/// organization memberships loaded. A resolved principal is cached (keyed by
/// token digest) for the configured window; memberships served from the
/// cache may be stale, which never widens access because the authorization
/// engine re-reads memberships from the store on every decision.
pub struct IdentityResolver {
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn TenancyStore>,
    cache: DashMap<String, CachedPrincipal>,
    cache_window: Duration,
    platform_admins: HashSet<String>,
}

impl IdentityResolver {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        store: Arc<dyn TenancyStore>,
        cache_window: Duration,
        platform_admins: Vec<String>,
    ) -> Self {
        Self {
            verifier,
            store,
            cache: DashMap::new(),
            cache_window,
            platform_admins: platform_admins.into_iter().collect(),
        }
    }

    pub async fn resolve(&self, credential: &str) -> Result<Principal, AppError> {
        if credential.is_empty() {
            return Err(AppError::Unauthenticated(anyhow::anyhow!(
                "Missing bearer credential"
            )));
        }

        let key = token_digest(credential);
        if let Some(hit) = self.cache.get(&key) {
            if hit.cached_at.elapsed() <= self.cache_window && hit.token_expires_at > Utc::now() {
                return Ok(hit.principal.clone());
            }
        }

        let identity = self.verifier.verify(credential).await?;

        let record = match self.store.find_principal(&identity.subject_id).await? {
            Some(record) => record,
            None => {
                let record = PrincipalRecord::new(
                    identity.subject_id.clone(),
                    identity
                        .display_name
                        .clone()
                        .unwrap_or_else(|| identity.subject_id.clone()),
                );
                self.store.insert_principal(&record).await?;
                tracing::info!(principal_id = %record.id, "Principal created on first verification");
                record
            }
        };

        if record.disabled {
            return Err(AppError::Unauthenticated(anyhow::anyhow!(
                "Principal is disabled"
            )));
        }

        let memberships = self
            .store
            .memberships_for_principal(&record.id)
            .await?
            .into_iter()
            .map(|m| (m.organization_id, m.role))
            .collect();

        let principal = Principal {
            platform_admin: self.platform_admins.contains(&record.id),
            id: record.id,
            display_name: record.display_name,
            memberships,
        };

        self.cache.insert(
            key,
            CachedPrincipal {
                principal: principal.clone(),
                cached_at: Instant::now(),
                token_expires_at: identity.expires_at,
            },
        );

        Ok(principal)
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
