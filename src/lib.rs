pub mod allocator;
pub mod config;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod ids;
pub mod services;
pub mod store;

use std::sync::Arc;

use services::catalog::CatalogService;
use services::mixture::MixtureService;
use services::step_instance::StepExecutor;
use services::step_template::StepTemplateService;
use store::Store;

/// Shared application state handed to every handler. Assembled once in
/// `main` and wrapped in an `Arc`, the way the donor assembles `AppServices`.
pub struct AppState {
    pub store: Arc<Store>,
    pub config: config::AppConfig,
    pub catalog: CatalogService,
    pub mixtures: MixtureService,
    pub step_templates: StepTemplateService,
    pub step_executor: StepExecutor,
}

impl AppState {
    pub fn new(config: config::AppConfig) -> Arc<Self> {
        let store = Store::new();
        let ids = Arc::new(ids::IdMinter::new(store.clone()));
        Arc::new(Self {
            catalog: CatalogService::new(store.clone()),
            mixtures: MixtureService::new(store.clone(), ids.clone()),
            step_templates: StepTemplateService::new(store.clone()),
            step_executor: StepExecutor::new(store.clone(), ids),
            store,
            config,
        })
    }
}

pub fn router() -> axum::Router<Arc<AppState>> {
    use axum::Router;

    Router::new()
        .nest("/health", health::health_routes())
        .nest(
            "/api",
            Router::new()
                .merge(handlers::catalog::catalog_routes())
                .merge(handlers::mixture::mixture_routes())
                .merge(handlers::step_template::step_template_routes())
                .merge(handlers::step_instance::step_instance_routes())
                .merge(handlers::traceability::traceability_routes()),
        )
}
