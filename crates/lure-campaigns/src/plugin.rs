//! Campaigns plugin: campaign API, tracking endpoints and the scheduler loop

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use lure_auth::AuthorizationGuard;
use lure_core::plugin::{
    LurePlugin, PluginContext, PluginError, PluginRoutes, ServiceRegistrationContext,
};
use lure_core::{GroupDirectory, MessageBroker};
use tracing::debug;
use utoipa::openapi::OpenApi;
use utoipa::OpenApi as OpenApiTrait;

use crate::handlers::{configure_routes, AppState, CampaignsApiDoc};
use crate::services::{
    CampaignScheduler, CampaignService, SchedulerConfig, TrackingConfig, TrackingService,
};

#[derive(Debug, Clone)]
pub struct CampaignsConfig {
    pub scheduler: SchedulerConfig,
    pub tracking: TrackingConfig,
    /// Start the periodic scheduler when services are registered.
    pub run_scheduler: bool,
    /// Shared secret expected from dispatchers.
    pub dispatcher_token: Option<String>,
}

impl Default for CampaignsConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            tracking: TrackingConfig::default(),
            run_scheduler: true,
            dispatcher_token: None,
        }
    }
}

pub struct CampaignsPlugin {
    config: CampaignsConfig,
}

impl CampaignsPlugin {
    pub fn new(config: CampaignsConfig) -> Self {
        Self { config }
    }
}

impl Default for CampaignsPlugin {
    fn default() -> Self {
        Self::new(CampaignsConfig::default())
    }
}

impl LurePlugin for CampaignsPlugin {
    fn name(&self) -> &'static str {
        "campaigns"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let db = context.require_service::<sea_orm::DatabaseConnection>()?;
            let directory = context.require_service::<dyn GroupDirectory>()?;
            let broker = context.require_service::<dyn MessageBroker>()?;

            let campaign_service = Arc::new(CampaignService::new(
                db.clone(),
                self.config.scheduler.min_send_interval_seconds,
            ));
            let tracking_service = Arc::new(TrackingService::new(
                db.clone(),
                self.config.tracking.clone(),
            ));
            let scheduler = Arc::new(CampaignScheduler::new(
                db,
                directory,
                broker,
                self.config.scheduler.clone(),
            ));

            context.register_service(campaign_service.clone());
            context.register_service(tracking_service.clone());
            context.register_service(scheduler.clone());
            context.register_service(Arc::new(
                AppState::new(campaign_service, tracking_service)
                    .with_dispatcher_token(self.config.dispatcher_token.clone()),
            ));

            // Runs for the lifetime of the process; plugin registration
            // does not wait on it.
            if self.config.run_scheduler {
                tokio::spawn(scheduler.run());
            }

            debug!("Campaigns plugin services registered");
            Ok(())
        })
    }

    fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let state = context.require_service::<AppState>().ok()?;
        let guard = context.require_service::<AuthorizationGuard>().ok()?;

        let routes = configure_routes(&guard).with_state(state);
        Some(PluginRoutes::new(routes))
    }

    fn openapi_schema(&self) -> Option<OpenApi> {
        Some(<CampaignsApiDoc as OpenApiTrait>::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_campaigns_plugin_name() {
        assert_eq!(CampaignsPlugin::default().name(), "campaigns");
    }

    #[tokio::test]
    async fn test_registration_requires_database() {
        let context = ServiceRegistrationContext::new();
        let result = CampaignsPlugin::default().register_services(&context).await;
        assert!(matches!(result, Err(PluginError::ServiceNotFound { .. })));
    }

    #[test]
    fn test_openapi_lists_tracking_endpoints() {
        let doc = CampaignsPlugin::default().openapi_schema().unwrap();
        assert!(doc.paths.paths.contains_key("/track/open"));
        assert!(doc.paths.paths.contains_key("/org-manager/realms/{realm}/campaigns"));
    }

    #[test]
    fn test_openapi_documents_timestamps_and_dispatcher_auth() {
        let doc = serde_json::to_value(CampaignsPlugin::default().openapi_schema().unwrap()).unwrap();
        let begin_date = &doc["components"]["schemas"]["CampaignResponse"]["properties"]["begin_date"];
        assert_eq!(begin_date["type"], "string");
        assert_eq!(begin_date["format"], "date-time");
        assert!(doc["components"]["schemas"]["PhishResponse"].is_object());
        assert!(doc["paths"]["/templates/{id}"]["get"]["responses"]["401"].is_object());
    }
}
