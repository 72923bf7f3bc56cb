use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Args;
use lure_auth::{AuthorizationGuard, GuardConfig};
use lure_campaigns::{CampaignsConfig, CampaignsPlugin, SchedulerConfig, TrackingConfig};
use lure_core::plugin::PluginManager;
use lure_core::MessageBroker;
use lure_dispatcher::{Dispatcher, DispatcherConfig, RateLimiter, SmtpSender};
use lure_identity::{IdentityConfig, IdentityGateway};
use lure_queue::{QueueConfig, QueuePlugin, StaticConnector};
use lure_tenants::{TenantConfig, TenantsPlugin};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use utoipa_swagger_ui::SwaggerUi;

use super::shutdown::shutdown_signal;

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1:8000", env = "LURE_ADDRESS")]
    pub address: String,

    /// Database connection URL (postgres:// or sqlite:)
    #[arg(long, env = "LURE_DATABASE_URL")]
    pub database_url: String,

    /// Keycloak base URL
    #[arg(long, env = "LURE_KEYCLOAK_URL")]
    pub keycloak_url: String,

    /// Client id of the master-realm service account used for administration
    #[arg(long, env = "LURE_KEYCLOAK_ADMIN_CLIENT_ID")]
    pub keycloak_admin_client_id: Option<String>,

    #[arg(long, env = "LURE_KEYCLOAK_ADMIN_CLIENT_SECRET", hide_env_values = true)]
    pub keycloak_admin_client_secret: Option<String>,

    /// Resource-server client whose permissions guard the API
    #[arg(long, default_value = "api", env = "LURE_API_CLIENT_ID")]
    pub api_client_id: String,

    /// Realm whose tokens may address every tenant
    #[arg(long, default_value = "platform", env = "LURE_OPERATOR_REALM")]
    pub operator_realm: String,

    /// Public URL of the web application, used for client redirect URIs
    #[arg(long, default_value = "http://localhost:3000", env = "LURE_APP_URL")]
    pub app_url: String,

    /// Redis URL of the send queue; messages stay in process when omitted
    #[arg(long, env = "LURE_REDIS_URL")]
    pub redis_url: Option<String>,

    #[arg(long, default_value = "emails", env = "LURE_QUEUE_NAME")]
    pub queue_name: String,

    #[arg(long, default_value_t = 60, env = "LURE_SCHEDULER_INTERVAL_SECS")]
    pub scheduler_interval_secs: u64,

    /// Emails published per scheduler tick
    #[arg(long, default_value_t = 100, env = "LURE_BATCH_SIZE")]
    pub batch_size: u64,

    #[arg(long, default_value_t = 1, env = "LURE_MIN_SEND_INTERVAL_SECS")]
    pub min_send_interval_secs: i64,

    /// Externally reachable API root embedded in tracking links
    #[arg(long, default_value = "http://localhost:8000/api", env = "LURE_PUBLIC_BASE_URL")]
    pub public_base_url: String,

    #[arg(long, default_value_t = 300, env = "LURE_JWKS_TTL_SECS")]
    pub jwks_ttl_secs: u64,

    /// Shared secret send workers present on template fetches and delivery
    /// callbacks; generated for the embedded worker when omitted
    #[arg(long, env = "LURE_DISPATCHER_TOKEN", hide_env_values = true)]
    pub dispatcher_token: Option<String>,

    /// Emails allowed per rate limit window by the embedded worker
    #[arg(long, default_value_t = 10, env = "LURE_RATE_LIMIT_MAX")]
    pub rate_limit_max: usize,

    #[arg(long, default_value_t = 1, env = "LURE_RATE_LIMIT_WINDOW_SECS")]
    pub rate_limit_window_secs: u64,

    #[arg(long, default_value_t = 10, env = "LURE_SMTP_TIMEOUT_SECS")]
    pub smtp_timeout_secs: u64,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    fn identity_config(&self) -> IdentityConfig {
        let config = IdentityConfig::new(self.keycloak_url.clone());
        match (&self.keycloak_admin_client_id, &self.keycloak_admin_client_secret) {
            (Some(id), Some(secret)) => config.with_admin_credentials(id.clone(), secret.clone()),
            _ => config,
        }
    }

    /// The configured dispatcher token, or a random one when messages stay
    /// in process and no external worker needs to know it.
    pub(crate) fn resolve_dispatcher_token(&self) -> Option<String> {
        match (&self.dispatcher_token, &self.redis_url) {
            (Some(token), _) => Some(token.clone()),
            (None, None) => Some(
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(48)
                    .map(char::from)
                    .collect(),
            ),
            (None, Some(_)) => None,
        }
    }

    /// Settings of the send worker running inside the API process. Only
    /// used without Redis, where no other process can reach the queue.
    pub(crate) fn embedded_dispatcher_config(&self, token: Option<String>) -> Option<DispatcherConfig> {
        if self.redis_url.is_some() {
            return None;
        }
        Some(DispatcherConfig {
            api_base_url: self.public_base_url.clone(),
            api_token: token,
            rate_limit_max: self.rate_limit_max,
            rate_limit_window: Duration::from_secs(self.rate_limit_window_secs),
            smtp_timeout: Duration::from_secs(self.smtp_timeout_secs),
            ..DispatcherConfig::default()
        })
    }

    pub(crate) fn campaigns_config(&self, dispatcher_token: Option<String>) -> CampaignsConfig {
        CampaignsConfig {
            scheduler: SchedulerConfig {
                interval: Duration::from_secs(self.scheduler_interval_secs.max(1)),
                batch_size: self.batch_size,
                min_send_interval_seconds: self.min_send_interval_secs,
            },
            tracking: TrackingConfig {
                public_base_url: self.public_base_url.clone(),
            },
            run_scheduler: true,
            dispatcher_token,
        }
    }

    async fn run(self) -> anyhow::Result<()> {
        debug!("Initializing database connection...");
        let db = lure_database::establish_connection(&self.database_url).await?;

        let dispatcher_token = self.resolve_dispatcher_token();
        if dispatcher_token.is_none() {
            warn!("No dispatcher token configured; send workers will be rejected");
        }

        let gateway = Arc::new(IdentityGateway::new(self.identity_config())?);
        let guard = Arc::new(AuthorizationGuard::new(
            gateway.clone(),
            GuardConfig {
                api_client_id: self.api_client_id.clone(),
                jwks_ttl: Duration::from_secs(self.jwks_ttl_secs),
                operator_realm: Some(self.operator_realm.clone()),
            },
        ));

        let mut plugin_manager = PluginManager::new();
        let context = plugin_manager.service_context();
        context.register_service(db);
        context.register_service(gateway);
        context.register_service(guard);

        // Order matters: campaigns need the broker and the group directory.
        plugin_manager.register_plugin(Box::new(QueuePlugin::new(QueueConfig {
            redis_url: self.redis_url.clone(),
            queue_name: self.queue_name.clone(),
            consumer_name: "scheduler".to_string(),
        })));
        plugin_manager.register_plugin(Box::new(TenantsPlugin::new(TenantConfig {
            app_url: self.app_url.clone(),
            api_client_id: self.api_client_id.clone(),
            system_realms: vec!["master".to_string(), self.operator_realm.clone()],
        })));
        plugin_manager.register_plugin(Box::new(CampaignsPlugin::new(
            self.campaigns_config(dispatcher_token.clone()),
        )));

        plugin_manager
            .initialize_plugins()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize plugins: {}", e))?;

        if let Some(config) = self.embedded_dispatcher_config(dispatcher_token) {
            let broker = plugin_manager
                .service_context()
                .require_service::<dyn MessageBroker>()
                .map_err(|e| anyhow::anyhow!("Embedded dispatcher needs a broker: {}", e))?;
            spawn_embedded_dispatcher(config, broker)?;
        }

        let app = plugin_manager
            .build_application()
            .map_err(|e| anyhow::anyhow!("Failed to build application: {}", e))?
            .merge(swagger_router(&plugin_manager))
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::new());

        let listener = TcpListener::bind(&self.address).await?;
        info!("Lure API listening on {}", self.address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("Lure API exited");
        Ok(())
    }
}

fn spawn_embedded_dispatcher(
    config: DispatcherConfig,
    broker: Arc<dyn MessageBroker>,
) -> anyhow::Result<()> {
    let limiter = Arc::new(RateLimiter::new(config.rate_limit_max, config.rate_limit_window)?);
    let mailer = Arc::new(SmtpSender::new(config.smtp_timeout));
    info!(
        "Embedded dispatcher sending through {} ({} per {:?})",
        config.api_base_url, config.rate_limit_max, config.rate_limit_window
    );
    let dispatcher = Dispatcher::new(config, mailer, limiter)?;
    tokio::spawn(async move {
        dispatcher.run(&StaticConnector(broker)).await;
    });
    Ok(())
}

fn swagger_router(plugin_manager: &PluginManager) -> Router {
    Router::new().merge(
        SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", plugin_manager.unified_openapi()),
    )
}
