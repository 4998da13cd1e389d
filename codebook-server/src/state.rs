//! Application state shared by every handler

use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_sesv2::Client as SesClient;
use shared::models::{User, UserRole};

use crate::audit::AuditLog;
use crate::auth::{DemoAccounts, JwtKeys, RateLimiter};
use crate::config::{Config, DemoAccount, EmailProvider, StoreBackend};
use crate::db::dynamo::DynamoStore;
use crate::db::memory::MemoryStore;
use crate::db::{self, Store, StoreError};
use crate::email::{LogMailer, Mailer, Notifier, SesMailer};
use crate::orders::OrderService;
use crate::services::{CatalogService, StockService};
use crate::shipping::{ShippingProvider, ShippoClient};
use crate::stripe::{PaymentGateway, StripeGateway};
use crate::util::hash_password;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Capacity of the audit retry queue
const AUDIT_QUEUE_SIZE: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub jwt: Arc<JwtKeys>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<Notifier>,
    pub audit: Arc<AuditLog>,
    pub stock: Arc<StockService>,
    pub catalog: Arc<CatalogService>,
    pub orders: Arc<OrderService>,
    pub demo_accounts: Arc<DemoAccounts>,
    /// Rate limiter for login/registration routes
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Build the production backends selected by `config`
    pub async fn new(config: Config) -> Result<Self, BoxError> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let store: Arc<dyn Store> = match config.store_backend {
            StoreBackend::DynamoDb => {
                tracing::info!(prefix = %config.table_prefix, "Using DynamoDB store");
                Arc::new(DynamoStore::new(
                    DynamoClient::new(&aws_config),
                    config.table_prefix.clone(),
                ))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store, data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let mailer: Arc<dyn Mailer> = match config.email_provider {
            EmailProvider::Ses => {
                let ses = match &config.ses_region {
                    Some(region) => {
                        let ses_config = aws_config
                            .to_builder()
                            .region(aws_config::Region::new(region.clone()))
                            .build();
                        SesClient::new(&ses_config)
                    }
                    None => SesClient::new(&aws_config),
                };
                Arc::new(SesMailer::new(ses, config.ses_from_email.clone()))
            }
            EmailProvider::Log => Arc::new(LogMailer),
        };

        let gateway = Arc::new(StripeGateway::new(config.stripe_secret_key.clone())?);
        let shipping = Arc::new(ShippoClient::new(
            config.shippo_api_key.clone(),
            config.shippo_base_url.clone(),
        )?);
        if config.shippo_api_key.is_none() {
            tracing::warn!("SHIPPO_API_KEY not set, label generation disabled");
        }

        Ok(Self::assemble(config, store, gateway, shipping, mailer))
    }

    /// Wire services over the given backends; spawns the audit retry worker
    pub fn assemble(
        config: Config,
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        shipping: Arc<dyn ShippingProvider>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let notifier = Arc::new(Notifier::new(
            mailer,
            config.admin_notify_email.clone(),
            config.app_base_url.clone(),
        ));
        let audit = AuditLog::spawn(store.clone(), AUDIT_QUEUE_SIZE);
        let stock = Arc::new(StockService::new(store.clone(), notifier.clone()));
        let catalog = Arc::new(CatalogService::new(store.clone(), audit.clone()));
        let orders = Arc::new(OrderService::new(
            store.clone(),
            stock.clone(),
            gateway.clone(),
            shipping,
            audit.clone(),
            notifier.clone(),
            config.require_paid_orders,
        ));

        Self {
            jwt: Arc::new(JwtKeys::new(&config.jwt_secret, config.jwt_expiry_hours)),
            demo_accounts: Arc::new(DemoAccounts::new(config.demo_emails())),
            config: Arc::new(config),
            store,
            gateway,
            notifier,
            audit,
            stock,
            catalog,
            orders,
            rate_limiter: RateLimiter::new(),
        }
    }

    /// Create the configured demo accounts that do not exist yet
    pub async fn seed_demo_accounts(&self) -> Result<(), BoxError> {
        let accounts = [
            (self.config.demo_guest.as_ref(), UserRole::User),
            (self.config.demo_admin.as_ref(), UserRole::Admin),
        ];
        for (account, role) in accounts {
            if let Some(account) = account {
                self.seed_account(account, role).await?;
            }
        }
        Ok(())
    }

    async fn seed_account(&self, account: &DemoAccount, role: UserRole) -> Result<(), BoxError> {
        if db::users::find_by_email(self.store.as_ref(), &account.email)
            .await?
            .is_some()
        {
            return Ok(());
        }

        let user = User {
            id: shared::util::new_id(),
            email: account.email.clone(),
            name: account.name.clone(),
            password_hash: hash_password(&account.password)
                .map_err(|e| format!("hashing demo password: {e}"))?,
            role,
            created_at: shared::util::now_millis(),
            notifications_read_at: None,
        };
        match db::users::create(self.store.as_ref(), &user).await {
            Ok(()) => {
                tracing::info!(email = %user.email, role = %role, "Demo account created");
                Ok(())
            }
            Err(StoreError::Conflict) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
