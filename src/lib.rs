//! # axum-jwt-filter
//!
//! JWT issuance and verification as [Axum](https://docs.rs/axum) middleware.
//!
//! - **Issuance** turns a successful JSON response body into a signed token:
//!   the body is buffered (up to a configured ceiling), parsed as a claim
//!   set, signed, and replaced by the token bytes.
//! - **Verification** takes a token from the `Authorization` header (or an
//!   `authorization` cookie), verifies it, and rewrites `Authorization` to
//!   the base64 of the verified claims as JSON.  Downstream handlers read
//!   claims from there and never see the raw token.
//!
//! Verification fails open: a missing or invalid token leaves the request
//! without claims, and the handler (or [`VerifiedClaims`]) decides whether
//! that is acceptable.  Tokens declaring `alg: none` are never trusted.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use axum::{routing::{get, post}, Json, Router};
//! use axum_jwt_filter::{JwtConfig, JwtRouterExt, VerifiedClaims};
//!
//! async fn login() -> Json<serde_json::Value> {
//!     Json(serde_json::json!({ "sub": "alice", "role": "admin" }))
//! }
//!
//! async fn me(VerifiedClaims(claims): VerifiedClaims) -> String {
//!     format!("hello {}", claims.subject().unwrap_or("stranger"))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = JwtConfig::from_env().unwrap();
//!     let issuing = JwtConfig::new().issue(true).merge(&server).build().unwrap();
//!     let verifying = JwtConfig::new().verify(true).merge(&server).build().unwrap();
//!
//!     let app: Router = Router::new()
//!         .route("/login", post(login))
//!         .with_jwt(&issuing)
//!         .merge(Router::new().route("/me", get(me)).with_jwt(&verifying));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```
//!
//! ## Configuration
//!
//! | Option              | Default | Notes                                         |
//! |---------------------|---------|-----------------------------------------------|
//! | `key`               | unset   | Inline key; excludes `key_file`               |
//! | `key_file`          | unset   | Read once when the scope is built             |
//! | `issue`             | off     |                                               |
//! | `issue_algorithm`   | `HS512` | `none`, `HS256/384/512`, `RS*`, `ES256/384/512`|
//! | `issue_buffer_size` | 1 MiB   | Larger bodies are answered with `413`         |
//! | `verify`            | off     |                                               |
//!
//! See [`JwtConfig::from_env`] for the matching environment variables.
//!
//! Tokens carry no expiry: `exp`/`nbf` claims are passed through but never
//! enforced.

pub mod accumulator;
pub mod claims;
pub mod config;
pub mod error;
pub mod filter;
pub mod issue;
pub mod key;
pub mod middleware;
pub mod token;
pub mod verify;

pub use accumulator::{AccumulatorState, BodyAccumulator};
pub use claims::ClaimSet;
pub use config::{JwtConfig, JwtScope};
pub use error::JwtError;
pub use filter::{AccessFilter, Decision, ResponseFilter};
pub use issue::IssueTransformer;
pub use key::{Key, KeySource, SigningAlgorithm};
pub use middleware::{
    issue_response, verify_request, JwtRouterExt, OptionalVerifiedClaims, VerifiedClaims,
};
pub use token::{issue_token, verify_token};
pub use verify::VerifyGate;
