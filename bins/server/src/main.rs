//! Coursepay API Server
//!
//! Main entry point for the Coursepay backend service.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursepay_api::{AppState, LivePaymentService, create_router};
use coursepay_core::gateway::HttpGatewayClient;
use coursepay_core::payment::PaymentService;
use coursepay_db::{CourseRepository, PaymentRepository, connect};
use coursepay_shared::{AppConfig, JwtConfig, JwtService};

/// How often the stale-checkout sweeper runs, and how old a `created`
/// payment must be before it is marked failed.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
const STALE_AFTER_MINUTES: i64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursepay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().expect("Failed to load configuration");

    // Connect to database
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    // Create JWT service
    let jwt_config = JwtConfig {
        secret: config.jwt.secret.clone(),
        #[allow(clippy::cast_possible_wrap)]
        access_token_expires_minutes: (config.jwt.access_token_expiry_secs / 60) as i64,
    };
    let jwt_service = JwtService::new(jwt_config);

    // Wire the payment orchestrator to its production collaborators
    let gateway = HttpGatewayClient::new(&config.gateway)
        .map_err(|e| anyhow::anyhow!("failed to build gateway client: {e}"))?;
    let payments: Arc<LivePaymentService> = Arc::new(PaymentService::new(
        gateway,
        PaymentRepository::new(db.clone()),
        CourseRepository::new(db.clone()),
        config.gateway.key_secret.clone(),
    ));
    info!(base_url = %config.gateway.base_url, "Payment gateway configured");

    // Background sweep for abandoned checkouts
    let sweeper = Arc::clone(&payments);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = sweeper
                .expire_stale_checkouts(chrono::Duration::minutes(STALE_AFTER_MINUTES))
                .await
            {
                warn!(error = %e, "stale checkout sweep failed");
            }
        }
    });

    // Create application state
    let state = AppState {
        db: Arc::new(db),
        jwt_service: Arc::new(jwt_service),
        payments,
        gateway: Arc::new(config.gateway.clone()),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
