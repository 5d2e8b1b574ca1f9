use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use bazaar_api::auth::{self, AppState, AppStateInner};
use bazaar_api::{listings, messages, users};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("BAZAAR_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("BAZAAR_DB_PATH").unwrap_or_else(|_| "bazaar.db".into());
    let media_url = std::env::var("BAZAAR_MEDIA_URL").unwrap_or_else(|_| "/media/".into());
    let host = std::env::var("BAZAAR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("BAZAAR_PORT")
        .unwrap_or_else(|_| "8000".into())
        .parse()?;

    // Init database
    let db = bazaar_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        media_url,
    });

    // Routes; per-handler `Auth` extraction decides public vs protected
    let app = Router::new()
        .route("/api/token", post(auth::login))
        .route("/api/users", get(users::list_users).post(auth::register))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/api/users/{id}/block", post(users::block_user))
        .route("/api/users/{id}/unblock", post(users::unblock_user))
        .route(
            "/api/listings",
            get(listings::list_listings).post(listings::create_listing),
        )
        .route("/api/listings/favorites", get(listings::list_favorites))
        .route(
            "/api/listings/{id}",
            get(listings::get_listing)
                .patch(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route("/api/listings/{id}/like", post(listings::like_listing))
        .route("/api/listings/{id}/dislike", post(listings::dislike_listing))
        .route(
            "/api/listings/{id}/favorite",
            post(listings::favorite_listing),
        )
        .route(
            "/api/listings/{id}/unfavorite",
            post(listings::unfavorite_listing),
        )
        .route(
            "/api/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route(
            "/api/messages/{id}",
            get(messages::get_message).delete(messages::delete_message),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Bazaar server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
