//! Plugin system for modular service registration and route configuration
//!
//! Each product area (tenants, campaigns, queue) ships a plugin that:
//! - registers its services into a shared, type-keyed registry
//! - optionally contributes an axum router and an OpenAPI document
//!
//! Plugins are initialized in registration order, so a plugin may
//! `require_service` anything registered by a plugin before it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::Router;
use thiserror::Error;
use tracing::debug;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::{ComponentsBuilder, InfoBuilder, OpenApi, OpenApiBuilder, ServerBuilder};

pub use axum;
pub use utoipa;

/// Prefix every plugin router is nested under.
pub const API_PREFIX: &str = "/api";

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin registration failed for '{plugin_name}': {error}")]
    PluginRegistrationFailed { plugin_name: String, error: String },

    #[error("Service '{service_type}' is required but not registered")]
    ServiceNotFound { service_type: String },

    #[error("Failed to initialize plugin system: {0}")]
    InitializationFailed(String),
}

/// Core plugin trait
pub trait LurePlugin: Send + Sync {
    /// Unique identifier for this plugin
    fn name(&self) -> &'static str;

    /// Register the services this plugin provides.
    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>>;

    /// HTTP routes, relative to [`API_PREFIX`].
    fn configure_routes(&self, _context: &PluginContext) -> Option<PluginRoutes> {
        None
    }

    fn openapi_schema(&self) -> Option<OpenApi> {
        None
    }
}

pub struct PluginRoutes {
    pub router: Router,
}

impl PluginRoutes {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

/// Type-safe service registry for dependency injection
#[derive(Default)]
pub struct ServiceRegistry {
    services: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TypeId, Box<dyn Any + Send + Sync>>> {
        self.services
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register<T: Send + Sync + 'static + ?Sized>(&self, service: Arc<T>) {
        debug!("Registering service: {}", std::any::type_name::<T>());
        self.lock().insert(TypeId::of::<T>(), Box::new(service));
    }

    pub fn get<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.lock()
            .get(&TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<Arc<T>>())
            .cloned()
    }

    pub fn require<T: Send + Sync + 'static + ?Sized>(&self) -> Result<Arc<T>, PluginError> {
        self.get::<T>().ok_or_else(|| PluginError::ServiceNotFound {
            service_type: std::any::type_name::<T>().to_string(),
        })
    }
}

/// Read-only view of the registry handed to route configuration.
pub struct PluginContext {
    service_registry: Arc<ServiceRegistry>,
}

impl PluginContext {
    pub fn get_service<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.service_registry.get::<T>()
    }

    pub fn require_service<T: Send + Sync + 'static + ?Sized>(
        &self,
    ) -> Result<Arc<T>, PluginError> {
        self.service_registry.require::<T>()
    }
}

/// Context used while plugins register their services.
#[derive(Default)]
pub struct ServiceRegistrationContext {
    service_registry: Arc<ServiceRegistry>,
}

impl ServiceRegistrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_service<T: Send + Sync + 'static + ?Sized>(&self, service: Arc<T>) {
        self.service_registry.register(service);
    }

    pub fn get_service<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.service_registry.get::<T>()
    }

    pub fn require_service<T: Send + Sync + 'static + ?Sized>(
        &self,
    ) -> Result<Arc<T>, PluginError> {
        self.service_registry.require::<T>()
    }

    pub fn create_plugin_context(&self) -> PluginContext {
        PluginContext {
            service_registry: self.service_registry.clone(),
        }
    }
}

/// Registers plugins, initializes them and assembles the application router
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn LurePlugin>>,
    context: ServiceRegistrationContext,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin (order matters for dependencies)
    pub fn register_plugin(&mut self, plugin: Box<dyn LurePlugin>) {
        debug!("Registering plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    pub async fn initialize_plugins(&mut self) -> Result<(), PluginError> {
        debug!("Initializing {} plugins", self.plugins.len());

        for plugin in &self.plugins {
            plugin.register_services(&self.context).await.map_err(|e| {
                PluginError::PluginRegistrationFailed {
                    plugin_name: plugin.name().to_string(),
                    error: e.to_string(),
                }
            })?;
            debug!("Initialized plugin: {}", plugin.name());
        }

        Ok(())
    }

    /// Merge every plugin router and nest the result under [`API_PREFIX`].
    pub fn build_application(&self) -> Result<Router, PluginError> {
        let plugin_context = self.context.create_plugin_context();
        let mut api_router = Router::new();

        for plugin in &self.plugins {
            if let Some(plugin_routes) = plugin.configure_routes(&plugin_context) {
                debug!("Adding routes for plugin: {}", plugin.name());
                api_router = api_router.merge(plugin_routes.router);
            }
        }

        Ok(Router::new().nest(API_PREFIX, api_router))
    }

    /// OpenAPI document covering every plugin's endpoints.
    pub fn unified_openapi(&self) -> OpenApi {
        let mut combined = OpenApiBuilder::new()
            .info(
                InfoBuilder::new()
                    .title("Lure")
                    .description(Some(
                        "Tenant administration, phishing campaigns and tracking for the Lure platform",
                    ))
                    .version(env!("CARGO_PKG_VERSION"))
                    .build(),
            )
            .servers(Some(vec![ServerBuilder::new()
                .url(API_PREFIX)
                .description(Some("Base path for all API endpoints"))
                .build()]))
            .components(Some(
                ComponentsBuilder::new()
                    .security_scheme(
                        "bearer_auth",
                        SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
                    )
                    .build(),
            ))
            .build();

        for plugin in &self.plugins {
            if let Some(schema) = plugin.openapi_schema() {
                debug!("Merging OpenAPI schema for plugin: {}", plugin.name());
                combined.merge(schema);
            }
        }

        combined
    }

    /// Register core services (database, gateways) before plugin initialization.
    pub fn service_context(&self) -> &ServiceRegistrationContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[derive(Debug)]
    struct Greeter(&'static str);

    struct GreeterPlugin;

    impl LurePlugin for GreeterPlugin {
        fn name(&self) -> &'static str {
            "greeter"
        }

        fn register_services<'a>(
            &'a self,
            context: &'a ServiceRegistrationContext,
        ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
            Box::pin(async move {
                context.register_service(Arc::new(Greeter("hello")));
                Ok(())
            })
        }

        fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
            let greeter = context.require_service::<Greeter>().ok()?;
            Some(PluginRoutes::new(
                Router::new().route("/hello", get(move || async move { greeter.0 })),
            ))
        }
    }

    #[tokio::test]
    async fn test_registered_service_is_resolvable() {
        let mut manager = PluginManager::new();
        manager.register_plugin(Box::new(GreeterPlugin));
        manager.initialize_plugins().await.unwrap();

        let greeter = manager.service_context().require_service::<Greeter>().unwrap();
        assert_eq!(greeter.0, "hello");
        assert!(manager.build_application().is_ok());
    }

    #[test]
    fn test_missing_service_is_an_error() {
        let registry = ServiceRegistry::new();
        let err = registry.require::<Greeter>().unwrap_err();
        assert!(matches!(err, PluginError::ServiceNotFound { .. }));
    }

    #[test]
    fn test_trait_objects_can_be_registered() {
        trait Named: Send + Sync {
            fn name(&self) -> String;
        }
        struct Fixed;
        impl Named for Fixed {
            fn name(&self) -> String {
                "fixed".into()
            }
        }

        let registry = ServiceRegistry::new();
        registry.register::<dyn Named>(Arc::new(Fixed));
        assert_eq!(registry.require::<dyn Named>().unwrap().name(), "fixed");
    }
}
