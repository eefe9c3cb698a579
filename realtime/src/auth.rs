//! Resolves a bearer token to the tenant a connection may register as.
//!
//! Token issuance lives elsewhere; this module only verifies access tokens and
//! applies the channel policy for each tenant type.

use crate::connection::{Platform, Tenant};
use crate::error::{AuthErrorKind, Error};
use events::{TenantId, TenantType};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Who a verified token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Either `User` or `Shop`; administrators are users carrying the admin role.
    pub tenant_type: TenantType,
    pub tenant_id: TenantId,
    pub platform: Option<Platform>,
    pub is_admin: bool,
}

impl Identity {
    /// Decide which registry key this identity may occupy on the requested channel.
    pub fn authorize(&self, requested: TenantType, platform: Platform) -> Result<Tenant, Error> {
        match requested {
            TenantType::Admin => {
                if self.tenant_type != TenantType::User || !self.is_admin {
                    return Err(Error::auth(AuthErrorKind::AdminRoleRequired));
                }
            }
            TenantType::User | TenantType::Shop => {
                if self.tenant_type != requested {
                    return Err(Error::auth(AuthErrorKind::TenantMismatch));
                }
            }
        }

        if !allows_platform(requested, platform) {
            return Err(Error::auth(AuthErrorKind::PlatformNotAllowed));
        }

        Ok(Tenant::new(requested, self.tenant_id))
    }
}

/// The admin console is web-only; users and shops connect from either platform.
pub fn allows_platform(tenant_type: TenantType, platform: Platform) -> bool {
    match tenant_type {
        TenantType::Admin => platform == Platform::Web,
        TenantType::User | TenantType::Shop => true,
    }
}

/// External collaborator that turns a bearer token into an [`Identity`].
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, Error>;
}

const ACCESS_TOKEN_TYPE: &str = "access";
const ADMIN_ROLE: &str = "admin";

/// Claims carried by access tokens issued at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<TenantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<TenantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    /// `access` or `refresh`; only access tokens open connections.
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: u64,
}

impl AccessClaims {
    fn into_identity(self) -> Result<Identity, Error> {
        if self.token_type != ACCESS_TOKEN_TYPE {
            return Err(Error::auth(AuthErrorKind::InvalidToken));
        }

        let (tenant_type, tenant_id) = match self.account_type.as_deref() {
            Some("shop") => (TenantType::Shop, self.shop_id),
            Some("user") | None => (TenantType::User, self.user_id),
            Some(_) => return Err(Error::auth(AuthErrorKind::InvalidClaims)),
        };
        let tenant_id = tenant_id.ok_or_else(|| Error::auth(AuthErrorKind::InvalidClaims))?;

        Ok(Identity {
            tenant_type,
            tenant_id,
            platform: self.platform.and_then(|p| p.parse().ok()),
            is_admin: self.role.as_deref() == Some(ADMIN_ROLE),
        })
    }
}

/// Verifies HS256 access tokens signed with the shared application secret.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity, Error> {
        let data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)?;
        data.claims.into_identity()
    }
}
