/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use goaltrack_api::{app::{build_router, connect_store, AppState}, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let store = connect_store(&config).await?;
/// let app = build_router(AppState::new(store, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderValue, Method},
    middleware::Next,
    routing::{get, post},
    Router,
};
use goaltrack_shared::{
    auth::middleware::{create_auth_middleware, create_optional_auth_middleware},
    db::{create_pool, get_migration_status, run_migrations, DatabaseConfig},
    store::{MemoryKeyspace, PgKeyspace, Store},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use crate::{
    config::{Config, StoreBackend},
    middleware::security::security_headers,
    routes,
    uploads::BannerStore,
};

/// Multipart framing allowance on top of the banner size limit
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared application state
///
/// Cloned into every handler by Axum's `State` extractor; all fields are
/// cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
    pub banners: BannerStore,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            banners: BannerStore::new(&config.uploads),
            store,
            config: Arc::new(config),
        }
    }
}

/// Opens the configured keyspace backend
///
/// For Postgres this creates the pool and applies pending migrations.
///
/// # Errors
///
/// Fails if the database is unreachable or a migration fails.
pub async fn connect_store(config: &Config) -> anyhow::Result<Store> {
    let store_config = &config.store;

    match store_config.backend {
        StoreBackend::Postgres => {
            let url = store_config
                .database_url
                .clone()
                .context("DATABASE_URL is required for the postgres backend")?;

            let pool = create_pool(DatabaseConfig {
                url,
                max_connections: store_config.max_connections,
                ..Default::default()
            })
            .await
            .context("Failed to connect to PostgreSQL")?;

            run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            let migrations = get_migration_status(&pool)
                .await
                .context("Failed to read migration status")?;

            info!(
                max_connections = store_config.max_connections,
                applied_migrations = migrations.applied_migrations,
                schema_version = ?migrations.latest_version,
                "Connected to PostgreSQL keyspace"
            );
            Ok(Store::new(
                Arc::new(PgKeyspace::new(pool)),
                store_config.call_timeout(),
            ))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory keyspace, data is lost on restart");
            Ok(Store::new(
                Arc::new(MemoryKeyspace::new()),
                store_config.call_timeout(),
            ))
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development: any origin, no credentials
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Builds the complete router
///
/// ```text
/// /api
/// ├── GET  /health
/// ├── /users
/// │   ├── POST /create, /verify-email, /login, /refresh,
/// │   │        /forgot-password, /reset-password      (public)
/// │   ├── POST /logout                                (optional session)
/// │   └── GET|PUT|DELETE /me                          (session)
/// └── /goals                                          (session)
///     ├── GET|POST /
///     ├── GET /status/:status, /category/:category, /upcoming, /stats
///     ├── POST /upload-banner
///     └── GET|PUT|DELETE /:id
/// /uploads/*                                          (static banner files)
/// ```
pub fn build_router(state: AppState) -> Router {
    use routes::{banners, goals, health, users};

    let secret = state.config.jwt.secret.clone();
    let require_session = || axum::middleware::from_fn(create_auth_middleware(secret.clone()));

    let public_user_routes = Router::new()
        .route("/create", post(users::create_user))
        .route("/verify-email", post(users::verify_email))
        .route("/login", post(users::login))
        .route("/refresh", post(users::refresh))
        .route("/forgot-password", post(users::forgot_password))
        .route("/reset-password", post(users::reset_password));

    let logout_routes = Router::new()
        .route("/logout", post(users::logout))
        .layer(axum::middleware::from_fn(create_optional_auth_middleware(
            secret.clone(),
        )));

    let account_routes = Router::new()
        .route(
            "/me",
            get(users::get_me).put(users::update_me).delete(users::delete_me),
        )
        .layer(require_session());

    let banner_limit = state.banners.max_bytes() + MULTIPART_OVERHEAD_BYTES;
    let goal_routes = Router::new()
        .route("/", get(goals::list_goals).post(goals::create_goal))
        .route("/status/:status", get(goals::goals_by_status))
        .route("/category/:category", get(goals::goals_by_category))
        .route("/upcoming", get(goals::upcoming_goals))
        .route("/stats", get(goals::goal_stats))
        .route(
            "/upload-banner",
            post(banners::upload_banner).layer(DefaultBodyLimit::max(banner_limit)),
        )
        .route(
            "/:id",
            get(goals::get_goal)
                .put(goals::update_goal)
                .delete(goals::delete_goal),
        )
        .layer(require_session());

    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .nest(
            "/users",
            public_user_routes.merge(logout_routes).merge(account_routes),
        )
        .nest("/goals", goal_routes);

    let production = state.config.api.production;
    let uploads = ServeDir::new(state.banners.dir());

    Router::new()
        .nest("/api", api_routes)
        .nest_service(&state.config.uploads.public_path, uploads)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(axum::middleware::from_fn(move |req: Request, next: Next| {
            security_headers(production, req, next)
        }))
        .with_state(state)
}
