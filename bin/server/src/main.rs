#[tokio::main]
async fn main() {
    use axum::{Router, routing::get};
    use cluster_login_platform_access::PendingStore;
    use cluster_login_server::{
        auth::{self, AppState, InMemoryHost, OAuthRealm, ResolvedRealm},
        config::ServerConfig,
    };
    use std::sync::Arc;
    use tower_http::trace::TraceLayer;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

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

    let settings = config.realm.clone().normalized();

    // Probe the pod environment for whatever the operator left unset
    tracing::info!("Discovering realm defaults...");
    let outcome = auth::discover(&settings, None).await;
    let realm = OAuthRealm::new(
        settings.clone(),
        None,
        ResolvedRealm::resolve(&settings, &outcome.defaults, outcome.client),
    );

    let host = Arc::new(match &config.policy_snapshot_path {
        Some(path) => InMemoryHost::with_snapshot(std::path::PathBuf::from(path))
            .expect("failed to load policy snapshot"),
        None => InMemoryHost::new(),
    });
    let pending = PendingStore::new(chrono::Duration::minutes(
        config.session.pending_ttl_minutes,
    ));

    let app_state = Arc::new(AppState::new(realm, pending, host, config.session.clone()));

    // Spawn periodic purge of expired pending authorizations
    let purge_state = app_state.clone();
    let purge_interval_secs = config.session.purge_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(purge_interval_secs));
        loop {
            interval.tick().await;
            let purged = purge_state.pending.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "Purged expired pending authorizations");
            }
        }
    });

    let app = Router::new()
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/logout", get(auth::logout))
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
