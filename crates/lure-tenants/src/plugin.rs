//! Tenants plugin: realm, user, group and compliance administration

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use lure_auth::AuthorizationGuard;
use lure_core::plugin::{
    LurePlugin, PluginContext, PluginError, PluginRoutes, ServiceRegistrationContext,
};
use lure_core::GroupDirectory;
use lure_identity::IdentityGateway;
use tracing::debug;
use utoipa::openapi::OpenApi;
use utoipa::OpenApi as OpenApiTrait;

use crate::handlers::{configure_routes, AppState, TenantsApiDoc};
use crate::services::{ComplianceService, QuizCooldown, TenantConfig, TenantService};

pub struct TenantsPlugin {
    config: TenantConfig,
}

impl TenantsPlugin {
    pub fn new(config: TenantConfig) -> Self {
        Self { config }
    }
}

impl Default for TenantsPlugin {
    fn default() -> Self {
        Self::new(TenantConfig::default())
    }
}

impl LurePlugin for TenantsPlugin {
    fn name(&self) -> &'static str {
        "tenants"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let db = context.require_service::<sea_orm::DatabaseConnection>()?;
            let gateway = context.require_service::<IdentityGateway>()?;

            let compliance_service = Arc::new(ComplianceService::new(
                db.clone(),
                QuizCooldown::default(),
            ));
            let tenant_service = Arc::new(TenantService::new(
                db,
                gateway,
                compliance_service.clone(),
                self.config.clone(),
            ));

            context.register_service(tenant_service.clone());
            context.register_service(compliance_service.clone());
            let directory: Arc<dyn GroupDirectory> = tenant_service.clone();
            context.register_service(directory);
            context.register_service(Arc::new(AppState::new(
                tenant_service,
                compliance_service,
            )));

            debug!("Tenants plugin services registered");
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
        Some(<TenantsApiDoc as OpenApiTrait>::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tenants_plugin_name() {
        assert_eq!(TenantsPlugin::default().name(), "tenants");
    }

    #[tokio::test]
    async fn test_registration_requires_database() {
        let context = ServiceRegistrationContext::new();
        let result = TenantsPlugin::default().register_services(&context).await;
        assert!(matches!(result, Err(PluginError::ServiceNotFound { .. })));
    }
}
