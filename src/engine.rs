use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::AuthGate;
use crate::cache::RecordCache;
use crate::config::{self, SecurityConfig};
use crate::crud::CrudService;
use crate::model::{ModelError, ModelFactory, RecordDefinition};
use crate::routes::{self, RouteContext};
use crate::schema::{SchemaError, SchemaRegistry};

/// Compiled application: one record definition and CRUD service per
/// registered schema, plus the shared auth gate.
///
/// `compile` is pure wiring and never touches the database;
/// `prepare_storage` runs the DDL pass and must succeed before the
/// router is served.
pub struct Engine {
    registry: Arc<SchemaRegistry>,
    definitions: HashMap<String, Arc<RecordDefinition>>,
    services: HashMap<String, Arc<CrudService>>,
    gate: Arc<AuthGate>,
    pool: PgPool,
}

impl Engine {
    pub fn compile(registry: SchemaRegistry, pool: PgPool) -> Result<Self, SchemaError> {
        let cfg = config::config();
        let registry = Arc::new(registry);
        let gate = Arc::new(AuthGate::new(cfg.security.jwt_secret.clone()));
        let cache = Arc::new(RecordCache::new(
            cfg.cache.enabled,
            cfg.cache.ttl_secs,
            cfg.cache.capacity,
        ));

        let mut definitions = HashMap::new();
        let mut services = HashMap::new();
        for schema in registry.all() {
            let schema = Arc::new(schema.clone());
            let definition = Arc::new(ModelFactory::build(&schema));
            let service = Arc::new(CrudService::new(
                schema.clone(),
                definition.clone(),
                pool.clone(),
                cache.clone(),
            ));
            definitions.insert(schema.name.clone(), definition);
            services.insert(schema.name.clone(), service);
        }

        Ok(Self { registry, definitions, services, gate, pool })
    }

    /// Creates or verifies every schema's table. A shape mismatch is
    /// fatal: serving against a drifted table corrupts data.
    pub async fn prepare_storage(&self) -> Result<(), ModelError> {
        for schema in self.registry.all() {
            // compile() built a definition for every registered schema.
            if let Some(definition) = self.definitions.get(&schema.name) {
                tracing::info!(schema = %schema.name, table = %definition.table_name, "preparing table");
                ModelFactory::ensure_table(&self.pool, definition).await?;
            }
        }
        Ok(())
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn service(&self, schema_name: &str) -> Option<&Arc<CrudService>> {
        self.services.get(schema_name)
    }

    /// Assembles the full application router: system routes, schema
    /// introspection, and the six CRUD routes per schema. CORS and
    /// request logging layers follow the configuration.
    pub fn router(&self) -> Router {
        let cfg = config::config();
        let mut app = routes::system_router(self.pool.clone())
            .merge(routes::describe_router(self.registry.clone()));

        for schema in self.registry.all() {
            let Some(service) = self.services.get(&schema.name) else { continue };
            let ctx = RouteContext {
                schema: Arc::new(schema.clone()),
                service: service.clone(),
                gate: self.gate.clone(),
            };
            app = app.merge(routes::schema_router(ctx));
        }

        if let Some(cors) = cors_layer(&cfg.security) {
            app = app.layer(cors);
        }
        if cfg.api.enable_request_logging {
            app = app.layer(TraceLayer::new_for_http());
        }
        app
    }
}

/// None when CORS is disabled; permissive when any origin is allowed,
/// otherwise restricted to the configured origin list. Unparsable
/// origins are logged and skipped.
fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin::builtin_registry;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new().connect_lazy("postgres://localhost/unused").unwrap()
    }

    #[tokio::test]
    async fn compile_builds_services_for_every_schema() {
        let engine = Engine::compile(builtin_registry().unwrap(), lazy_pool()).unwrap();
        for name in ["product", "customer", "task"] {
            assert!(engine.service(name).is_some(), "missing service for {}", name);
        }
        assert!(engine.service("order").is_none());
    }

    #[tokio::test]
    async fn router_assembles_without_storage() {
        let engine = Engine::compile(builtin_registry().unwrap(), lazy_pool()).unwrap();
        let _router = engine.router();
    }

    #[test]
    fn cors_layer_follows_config() {
        let mut security = crate::config::AppConfig::development().security;
        assert!(cors_layer(&security).is_some());

        security.cors_origins = vec!["*".to_string()];
        assert!(cors_layer(&security).is_some());

        security.enable_cors = false;
        assert!(cors_layer(&security).is_none());
    }
}
