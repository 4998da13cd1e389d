//! Server configuration (environment variables, `.env` in development)

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    DynamoDb,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailProvider {
    Ses,
    Log,
}

/// Pre-seeded account, created at startup when missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoAccount {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// development | staging | production
    pub environment: String,
    pub http_port: u16,
    pub store_backend: StoreBackend,
    /// DynamoDB tables are named `<prefix><table>`
    pub table_prefix: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    /// Default currency for payment intents
    pub currency: String,
    /// Orders must reference a succeeded payment intent
    pub require_paid_orders: bool,
    pub shippo_api_key: Option<String>,
    pub shippo_base_url: String,
    pub email_provider: EmailProvider,
    pub ses_from_email: String,
    pub ses_region: Option<String>,
    pub admin_notify_email: String,
    pub demo_guest: Option<DemoAccount>,
    pub demo_admin: Option<DemoAccount>,
    /// Base for links in emails
    pub app_base_url: String,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_flag(name: &str) -> bool {
    env_opt(name).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

fn demo_account(prefix: &str, default_name: &str) -> Option<DemoAccount> {
    Some(DemoAccount {
        email: shared::models::normalize_email(&env_opt(&format!("{prefix}_EMAIL"))?),
        password: env_opt(&format!("{prefix}_PASSWORD"))?,
        name: env_opt(&format!("{prefix}_NAME")).unwrap_or_else(|| default_name.into()),
    })
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = env_opt("ENVIRONMENT").unwrap_or_else(|| "development".into());
        let dev = environment == "development";

        let store_backend = match env_opt("STORE_BACKEND").as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("dynamodb") => StoreBackend::DynamoDb,
            Some(other) => return Err(format!("unknown STORE_BACKEND: {other}").into()),
            None if dev => StoreBackend::Memory,
            None => StoreBackend::DynamoDb,
        };
        let email_provider = match env_opt("EMAIL_PROVIDER").as_deref() {
            Some("ses") => EmailProvider::Ses,
            Some("log") => EmailProvider::Log,
            Some(other) => return Err(format!("unknown EMAIL_PROVIDER: {other}").into()),
            None if dev => EmailProvider::Log,
            None => EmailProvider::Ses,
        };

        let demo_guest = demo_account("DEMO_GUEST", "Guest Reader");
        let demo_admin = demo_account("DEMO_ADMIN", "Store Admin");
        let admin_notify_email = env_opt("ADMIN_NOTIFY_EMAIL")
            .or_else(|| demo_admin.as_ref().map(|a| a.email.clone()))
            .unwrap_or_default();
        if admin_notify_email.is_empty() {
            tracing::warn!("No ADMIN_NOTIFY_EMAIL or demo admin configured, admin emails disabled");
        }

        Ok(Self {
            http_port: env_opt("HTTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            store_backend,
            table_prefix: std::env::var("TABLE_PREFIX").unwrap_or_else(|_| "codebook-".into()),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            jwt_expiry_hours: env_opt("JWT_EXPIRY_HOURS")
                .and_then(|h| h.parse().ok())
                .filter(|h| *h > 0)
                .unwrap_or(24),
            stripe_secret_key: Self::require_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: Self::require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            currency: env_opt("CURRENCY")
                .map(|c| c.to_ascii_lowercase())
                .unwrap_or_else(|| "usd".into()),
            require_paid_orders: env_flag("REQUIRE_PAID_ORDERS"),
            shippo_api_key: env_opt("SHIPPO_API_KEY"),
            shippo_base_url: env_opt("SHIPPO_BASE_URL")
                .unwrap_or_else(|| "https://api.goshippo.com".into()),
            email_provider,
            ses_from_email: env_opt("SES_FROM_EMAIL")
                .unwrap_or_else(|| "noreply@codebook.dev".into()),
            ses_region: env_opt("SES_REGION"),
            admin_notify_email,
            demo_guest,
            demo_admin,
            app_base_url: env_opt("APP_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".into()),
            environment,
        })
    }

    /// Emails of the accounts nobody may modify or delete
    pub fn demo_emails(&self) -> Vec<String> {
        [&self.demo_guest, &self.demo_admin]
            .into_iter()
            .flatten()
            .map(|a| a.email.clone())
            .collect()
    }

    /// In-memory development configuration
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            environment: "development".into(),
            http_port: 0,
            store_backend: StoreBackend::Memory,
            table_prefix: "test-".into(),
            jwt_secret: "test-jwt-secret".into(),
            jwt_expiry_hours: 24,
            stripe_secret_key: "sk_test".into(),
            stripe_webhook_secret: "whsec_test".into(),
            currency: "usd".into(),
            require_paid_orders: false,
            shippo_api_key: None,
            shippo_base_url: "https://api.goshippo.com".into(),
            email_provider: EmailProvider::Log,
            ses_from_email: "noreply@codebook.dev".into(),
            ses_region: None,
            admin_notify_email: "admin@codebook.dev".into(),
            demo_guest: Some(DemoAccount {
                email: "guest@codebook.dev".into(),
                password: "guest-password".into(),
                name: "Guest Reader".into(),
            }),
            demo_admin: Some(DemoAccount {
                email: "admin@codebook.dev".into(),
                password: "admin-password".into(),
                name: "Store Admin".into(),
            }),
            app_base_url: "http://localhost:3000".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_required_outside_development() {
        // Names no other test sets
        let missing = "CODEBOOK_TEST_SECRET_NEVER_SET";
        assert!(Config::require_secret(missing, "production").is_err());
        assert_eq!(
            Config::require_secret(missing, "development").unwrap(),
            format!("dev-{missing}-not-for-production")
        );
    }

    #[test]
    fn test_demo_emails() {
        let config = Config::for_tests();
        assert_eq!(
            config.demo_emails(),
            vec!["guest@codebook.dev", "admin@codebook.dev"]
        );
    }
}
