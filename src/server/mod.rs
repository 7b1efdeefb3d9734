pub mod config;

use crate::{
    auth::{
        jwt::{JwtService, JwtServiceImpl},
        middleware::{admin_middleware, jwt_auth_middleware, jwt_only_middleware},
    },
    billing::{
        StripeApi, StripeBilling, StripeClient, WompiApi, WompiBilling, WompiClient,
    },
    completion::{CompletionProvider, OpenAiProvider},
    config::Config,
    database::{DatabaseManager, DatabaseManagerImpl},
    entitlement::EntitlementLedger,
    error::AppError,
    generation::GenerationService,
    health::HealthService,
    jobs::{JobScheduler, UsageResetJob},
    metrics,
    middleware::{cors_layer, request_id_middleware, request_logger},
    routes::{
        create_admin_routes, create_api_key_routes, create_auth_routes, create_billing_routes,
        create_docs_routes, create_generation_routes, create_health_routes, create_plans_routes,
        create_protected_auth_routes, create_session_routes, create_webhook_routes,
    },
    shutdown::{DatabaseShutdown, JobSchedulerShutdown, ShutdownCoordinator, ShutdownManager},
};
use axum::{Router, extract::DefaultBodyLimit, middleware};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{error, info};

/// Request bodies above this are rejected
const MAX_BODY_SIZE: usize = 1024 * 1024;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state; every field is cheap to clone
#[derive(Clone)]
pub struct Server {
    pub config: Arc<Config>,
    pub jwt_service: Arc<dyn JwtService>,
    pub database: Arc<dyn DatabaseManager>,
    pub ledger: EntitlementLedger,
    pub generation_service: Arc<GenerationService>,
    pub stripe: Arc<StripeBilling>,
    pub wompi: Arc<WompiBilling>,
    pub health_service: Arc<HealthService>,
    pub shutdown_coordinator: Arc<ShutdownCoordinator>,
}

/// Outbound collaborators, swappable for tests
pub struct ServerDependencies {
    pub database: Arc<DatabaseManagerImpl>,
    pub provider: Arc<dyn CompletionProvider>,
    pub stripe_api: Arc<dyn StripeApi>,
    pub wompi_api: Arc<dyn WompiApi>,
}

impl Server {
    /// Build the server against the real database and HTTP providers
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let database = Arc::new(
            DatabaseManagerImpl::new_from_config(&config)
                .await
                .map_err(AppError::Database)?,
        );

        let openai = Arc::new(
            OpenAiProvider::new(config.completion.clone())
                .map_err(|e| AppError::Internal(format!("Failed to build completion client: {}", e)))?,
        );
        let billing_timeout = Duration::from_secs(config.billing.timeout);
        let stripe_api = StripeClient::new(config.billing.stripe.clone(), billing_timeout)
            .map_err(|e| AppError::Internal(format!("Failed to build Stripe client: {}", e)))?;
        let wompi_api = WompiClient::new(config.billing.wompi.clone(), billing_timeout)
            .map_err(|e| AppError::Internal(format!("Failed to build Wompi client: {}", e)))?;

        let server = Self::with_dependencies(
            config,
            ServerDependencies {
                database,
                provider: openai.clone(),
                stripe_api: Arc::new(stripe_api),
                wompi_api: Arc::new(wompi_api),
            },
        )
        .await?;
        server.health_service.register(openai).await;
        Ok(server)
    }

    pub async fn with_dependencies(
        config: Config,
        deps: ServerDependencies,
    ) -> Result<Self, AppError> {
        let jwt_impl = JwtServiceImpl::from_config(&config.jwt)?;
        let health_service = Arc::new(HealthService::new());
        health_service.register(deps.database.clone()).await;
        health_service.register(jwt_impl.health_checker()).await;

        let database: Arc<dyn DatabaseManager> = deps.database;
        let ledger = EntitlementLedger::new(database.clone(), config.plans.limits());
        let generation_service = Arc::new(GenerationService::new(
            ledger.clone(),
            deps.provider,
            database.clone(),
        ));
        let stripe = Arc::new(StripeBilling::new(
            deps.stripe_api,
            database.clone(),
            config.plans.clone(),
            config.billing.clone(),
        ));
        let wompi = Arc::new(WompiBilling::new(
            deps.wompi_api,
            database.clone(),
            ledger.clone(),
            config.plans.clone(),
            config.billing.wompi.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            jwt_service: Arc::new(jwt_impl),
            database,
            ledger,
            generation_service,
            stripe,
            wompi,
            health_service,
            shutdown_coordinator: Arc::new(ShutdownCoordinator::new()),
        })
    }

    pub async fn run(&self) -> Result<(), AppError> {
        if self.config.database.migration_on_startup {
            info!("Running database migrations");
            self.database.migrate().await?;
        }

        let _metrics_handle = if self.config.metrics.enabled {
            Some(metrics::init_metrics(&self.config.metrics).map_err(|e| {
                AppError::Internal(format!("Failed to start metrics server: {}", e))
            })?)
        } else {
            None
        };

        let scheduler = Arc::new(Mutex::new(JobScheduler::with_shutdown_coordinator(
            self.config.jobs.clone(),
            self.shutdown_coordinator.subscribe(),
        )));
        scheduler
            .lock()
            .await
            .start(vec![Arc::new(UsageResetJob::new(self.ledger.clone()))])
            .await?;

        let mut shutdown_manager = ShutdownManager::new(SHUTDOWN_TIMEOUT);
        shutdown_manager.register(JobSchedulerShutdown::new(scheduler));
        shutdown_manager.register(DatabaseShutdown::new(self.database.clone()));

        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;
        info!("Server listening on http://{}", addr);

        let coordinator = self.shutdown_coordinator.clone();
        tokio::spawn(async move {
            coordinator.wait_for_shutdown_signal().await;
        });

        let mut shutdown_rx = self.shutdown_coordinator.subscribe();
        let result = axum::serve(
            listener,
            self.create_app()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            info!("Graceful shutdown initiated");
        })
        .await;

        if let Err(e) = result {
            error!("Server error: {}", e);
        }

        shutdown_manager.shutdown_all().await;
        info!("Server shutdown complete");
        Ok(())
    }

    pub fn create_app(&self) -> Router {
        let api = Router::new()
            .nest(
                "/auth",
                create_auth_routes()
                    .merge(self.authenticated(create_protected_auth_routes()))
                    .merge(self.session_only(create_session_routes())),
            )
            .nest("/api-keys", self.session_only(create_api_key_routes()))
            .merge(self.authenticated(create_generation_routes()))
            .merge(create_plans_routes())
            .nest("/billing", self.authenticated(create_billing_routes()))
            .nest("/webhooks", create_webhook_routes())
            .nest("/admin", self.admin_only(create_admin_routes()))
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

        let app = Router::new()
            .nest("/api/v1", api)
            .nest("/health", create_health_routes())
            .merge(create_docs_routes())
            .with_state(self.clone());

        self.add_request_middleware(app)
    }

    fn authenticated(&self, routes: Router<Server>) -> Router<Server> {
        routes.layer(middleware::from_fn_with_state(
            self.clone(),
            jwt_auth_middleware,
        ))
    }

    fn session_only(&self, routes: Router<Server>) -> Router<Server> {
        routes.layer(middleware::from_fn_with_state(
            self.clone(),
            jwt_only_middleware,
        ))
    }

    /// The admin check is the inner layer so it sees the authenticated account
    fn admin_only(&self, routes: Router<Server>) -> Router<Server> {
        self.authenticated(routes.layer(middleware::from_fn(admin_middleware)))
    }

    fn add_request_middleware(&self, mut app: Router) -> Router {
        if self.config.metrics.enabled {
            app = app.layer(middleware::from_fn(metrics::metrics_middleware));
        }
        if self.config.logging.log_request {
            app = app.layer(middleware::from_fn(request_logger));
        }
        app.layer(middleware::from_fn(request_id_middleware))
            .layer(cors_layer(&self.config.server.cors_origins))
    }
}
