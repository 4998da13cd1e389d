//! Request identity
//!
//! Bearer JWTs are verified by [`middleware::require_auth`] (route groups)
//! or directly by the [`AuthContext`] extractor. Role checks live on the
//! context itself so services can enforce them without touching HTTP types.

pub mod jwt;
pub mod middleware;
pub mod rate_limit;

use shared::error::{AppError, ErrorCode};
use shared::models::{User, UserRole};

pub use jwt::{Claims, JwtError, JwtKeys};
pub use middleware::require_auth;
pub use rate_limit::RateLimiter;

/// Verified identity of the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    /// Unix seconds
    pub issued_at: i64,
    /// Unix seconds
    pub expires_at: i64,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::AdminRequired))
        }
    }

    /// Caller is `user_id` or an admin
    pub fn require_self_or_admin(&self, user_id: &str) -> Result<(), AppError> {
        if self.is_admin() || self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::new(ErrorCode::IdentityMismatch))
        }
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

/// Pre-seeded accounts that can be neither modified nor deleted
#[derive(Debug, Clone, Default)]
pub struct DemoAccounts {
    emails: Vec<String>,
}

impl DemoAccounts {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| shared::models::normalize_email(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, email: &str) -> bool {
        let email = shared::models::normalize_email(email);
        self.emails.iter().any(|e| *e == email)
    }

    /// Reject mutations of a demo account, whoever asks
    pub fn ensure_mutable(&self, user: &User) -> Result<(), AppError> {
        if self.contains(&user.email) {
            return Err(AppError::new(ErrorCode::DemoAccountProtected)
                .with_detail("user_id", user.id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::user;

    fn ctx(user_id: &str, role: UserRole) -> AuthContext {
        AuthContext {
            user_id: user_id.into(),
            email: format!("{user_id}@codebook.dev"),
            name: user_id.into(),
            role,
            issued_at: 0,
            expires_at: i64::MAX,
        }
    }

    #[test]
    fn test_role_guards() {
        let reader = ctx("u1", UserRole::User);
        let admin = ctx("a1", UserRole::Admin);

        assert_eq!(
            reader.require_admin().unwrap_err().code,
            ErrorCode::AdminRequired
        );
        assert!(admin.require_admin().is_ok());

        assert!(reader.require_self_or_admin("u1").is_ok());
        assert_eq!(
            reader.require_self_or_admin("u2").unwrap_err().code,
            ErrorCode::IdentityMismatch
        );
        assert!(admin.require_self_or_admin("u2").is_ok());
    }

    #[test]
    fn test_demo_accounts_are_protected() {
        let demo = DemoAccounts::new(["Guest@CodeBook.dev", ""]);
        assert!(demo.contains("guest@codebook.dev"));

        let guest = user("u1", "guest@codebook.dev", UserRole::User);
        assert_eq!(
            demo.ensure_mutable(&guest).unwrap_err().code,
            ErrorCode::DemoAccountProtected
        );
        assert!(
            demo.ensure_mutable(&user("u2", "reader@codebook.dev", UserRole::User))
                .is_ok()
        );
    }
}
