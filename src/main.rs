use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use reel_campaign::{
    app_state::AppState,
    config::{AppConfig, ServiceAvailability, VideoBackendMode},
    routes,
    services::{
        credits::CreditLedger,
        encryption::SessionCipher,
        generation::JobRegistry,
        retry::RetryPolicy,
        session::{FileSessionStore, MemorySessionStore, SessionStore},
        threads::{ThreadsApi, ThreadsClient, ThreadsOAuth},
        threads_auth::{AuthorizationPrompt, CallbackPrompt, ThreadsAuth},
        video_backend::{MockVideoBackend, OpenAiVideoClient, VideoBackend},
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");
    let availability = ServiceAvailability::resolve(&config);

    tracing::info!(
        video_backend = ?availability.video_backend,
        threads_login = availability.threads_login,
        persistent_session = availability.persistent_session,
        "Initializing reel-campaign server"
    );

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe_metrics();

    // Video generation backend
    let backend: Arc<dyn VideoBackend> = match (availability.video_backend, config.openai_api_key()) {
        (VideoBackendMode::Remote, Some(api_key)) => {
            tracing::info!("Using OpenAI video generation backend");
            Arc::new(OpenAiVideoClient::new(api_key).expect("Failed to initialize OpenAI client"))
        }
        _ => {
            tracing::warn!("OPENAI_API_KEY not set, using mock video backend");
            Arc::new(MockVideoBackend::new(
                Duration::from_millis(config.mock_delay_ms),
                config.mock_failure_rate,
            ))
        }
    };

    let ledger = Arc::new(CreditLedger::new(config.initial_credits));
    let jobs = JobRegistry::new(ledger, backend, RetryPolicy::generation());

    // Threads token store
    let store: Arc<dyn SessionStore> = match config.session_store_path() {
        Some(path) => {
            let cipher = config.session_encryption_key().map(|key| {
                SessionCipher::from_base64_key(key).expect("Failed to initialize session encryption")
            });
            if cipher.is_none() {
                tracing::warn!("SESSION_ENCRYPTION_KEY not set, Threads token stored in plain text");
            }
            Arc::new(
                FileSessionStore::open(path, cipher)
                    .await
                    .expect("Failed to open session store"),
            )
        }
        None => {
            tracing::info!("Using in-memory Threads session store");
            Arc::new(MemorySessionStore::new())
        }
    };

    // Threads Graph API client
    let threads = Arc::new(
        ThreadsClient::new(
            &config.threads_app_id,
            config.threads_app_secret(),
            &config.threads_redirect_uri,
        )
        .expect("Failed to initialize Threads client"),
    );
    let login_prompt = Arc::new(CallbackPrompt::new(Duration::from_secs(
        config.login_timeout_secs,
    )));
    let auth = ThreadsAuth::new(
        store,
        Arc::clone(&threads) as Arc<dyn ThreadsOAuth>,
        Arc::clone(&login_prompt) as Arc<dyn AuthorizationPrompt>,
        availability.threads_login,
    );

    let state = AppState::new(
        availability,
        jobs,
        auth,
        login_prompt,
        threads as Arc<dyn ThreadsApi>,
    );

    let app = routes::api_router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting reel-campaign on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
