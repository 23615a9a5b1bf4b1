mod config;

use std::sync::Arc;

use axum::Router;
use axum::http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use palace_api::{AppState, AppStateInner, routes};
use palace_crypto::SessionCodec;
use palace_db::Database;
use palace_notify::smtp::SmtpNotifier;
use palace_notify::{LogNotifier, Notifier};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "palace=debug,palace_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Database::open(&config.db_path)?;

    let notifier: Arc<dyn Notifier> = match config.smtp.clone() {
        Some(smtp) => {
            info!("SMTP relay {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpNotifier::new(smtp)?)
        }
        None => {
            warn!("SMTP not configured, emails will be logged instead of sent");
            Arc::new(LogNotifier::new(config.brand_name.clone()))
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        sessions: SessionCodec::new(&config.jwt_secret),
        notifier,
        base_url: config.base_url.clone(),
        secure_cookies: config.production,
    });

    let pages = match &config.static_dir {
        Some(dir) => {
            info!("Serving pages from {}", dir.display());
            Router::new().fallback_service(ServeDir::new(dir))
        }
        None => Router::new(),
    };

    // Credentialed CORS only for our own origin; the session rides in a cookie.
    let cors = match config.base_url.parse() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(true),
        Err(_) => {
            warn!("PALACE_BASE_URL is not a valid origin, cross-origin requests are disabled");
            CorsLayer::new()
        }
    };

    let app = routes::app(state, pages)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("{} listening on {}", config.brand_name, config.addr);
    info!("Public base URL: {}", config.base_url);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
