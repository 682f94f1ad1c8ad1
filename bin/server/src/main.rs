use axum::{
    Router,
    routing::{get, post},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authgate_identity::{FlowCipher, StateCodec};
use authgate_server::{
    auth::{self, AppState, LoginOrchestrator, OidcBroker, db::TokenRepository, relations::RelationsNotifier},
    config::ServerConfig,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // The envelope-signing secret and the cipher secret protect against
    // different adversaries and must not coincide.
    assert!(
        config.flow.state_secret != config.flow.encryption_secret,
        "flow state secret and encryption secret must differ"
    );

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Cleanup expired tokens on startup
    let token_repo = TokenRepository::new(db_pool.clone());
    match token_repo.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(deleted_tokens = count, "Cleaned up expired tokens on startup");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired tokens on startup");
        }
    }

    // Spawn periodic token cleanup task
    let cleanup_pool = db_pool.clone();
    let cleanup_interval_secs = config.token.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            let repo = TokenRepository::new(cleanup_pool.clone());
            match repo.delete_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_tokens = count, "Periodic token cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired tokens");
                }
            }
        }
    });

    // Initialize the identity provider broker
    tracing::info!("Discovering identity provider...");
    let broker = OidcBroker::discover(config.oidc.clone())
        .await
        .expect("failed to discover identity provider");

    let relations =
        RelationsNotifier::new(&config.datasync).expect("failed to create relations notifier");

    let codec = StateCodec::new(&config.flow.state_secret);
    let cipher = FlowCipher::new(&config.flow.encryption_secret);

    let orchestrator = LoginOrchestrator::new(
        db_pool,
        codec.clone(),
        cipher,
        Arc::new(broker),
        relations,
        config.token.clone(),
        config.oidc,
    );

    // Create application state
    let app_state = Arc::new(AppState::new(orchestrator, codec, config.token));

    let app = Router::new()
        .route("/oidc/login", get(auth::login))
        .route("/oidc/login/callback", get(auth::login_callback))
        .route("/oidc/verify/callback", get(auth::verification_callback))
        .route("/oidc/logout", get(auth::logout))
        .route("/oidc/invalidate", post(auth::invalidate))
        .route("/terms/accept", post(auth::accept_terms))
        .route("/health", get(auth::health))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}
