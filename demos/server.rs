//! A small server with one issuing and two verifying routes.
//!
//! ```bash
//! JWT_KEY=secret RUST_LOG=axum_jwt_filter=debug cargo run --example server
//!
//! TOKEN=$(curl -s -XPOST localhost:3000/login -d '{"sub":"alice","role":"admin"}' \
//!     -H 'content-type: application/json')
//! curl -s localhost:3000/me -H "Authorization: Bearer $TOKEN"
//! curl -s localhost:3000/me --cookie "authorization=$TOKEN"
//! ```

use axum::routing::{get, post};
use axum::{Json, Router};
use axum_jwt_filter::{JwtConfig, JwtRouterExt, OptionalVerifiedClaims, VerifiedClaims};
use tracing_subscriber::EnvFilter;

/// Echoes the posted claims; the issuing layer turns them into a token.
async fn login(Json(claims): Json<serde_json::Value>) -> Json<serde_json::Value> {
    Json(claims)
}

async fn me(VerifiedClaims(claims): VerifiedClaims) -> String {
    claims.to_string()
}

async fn greeting(claims: OptionalVerifiedClaims) -> String {
    match claims.as_ref().and_then(|c| c.subject()) {
        Some(sub) => format!("hello {sub}"),
        None => "hello stranger".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let server = JwtConfig::from_env()?;
    let issuing = JwtConfig::new().issue(true).merge(&server).build()?;
    let verifying = JwtConfig::new().verify(true).merge(&server).build()?;

    let app: Router = Router::new()
        .route("/login", post(login))
        .with_jwt(&issuing)
        .merge(
            Router::new()
                .route("/me", get(me))
                .route("/", get(greeting))
                .with_jwt(&verifying),
        );

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
