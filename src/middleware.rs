use axum::body::Body;
use axum::extract::{FromRequestParts, Request, State};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::request::Parts;
use http::{HeaderMap, HeaderValue};
use http_body::Body as _;
use http_body_util::BodyExt;

use crate::claims::ClaimSet;
use crate::config::JwtScope;
use crate::error::JwtError;
use crate::filter::{AccessFilter, Decision, ResponseFilter};
use crate::issue::IssueTransformer;
use crate::verify::VerifyGate;

/// Access-phase middleware running the [`VerifyGate`].
///
/// Use with [`axum::middleware::from_fn_with_state`], or through
/// [`JwtRouterExt::with_jwt`].
pub async fn verify_request(
    State(scope): State<JwtScope>,
    mut req: Request,
    next: Next,
) -> Response {
    let gate = VerifyGate::new(scope);
    match gate.on_request_access_check(req.headers_mut()) {
        Decision::Reject(err) => err.into_response(),
        _ => next.run(req).await,
    }
}

/// Response middleware running the [`IssueTransformer`].
///
/// The inner response body is pulled frame by frame into the transformer.
/// When it engages, the client sees either the token (with a matching
/// `Content-Length`) or an error, never the original body.
pub async fn issue_response(State(scope): State<JwtScope>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if !scope.issue_enabled() {
        return response;
    }

    let (mut parts, mut body) = response.into_parts();
    let mut transformer = IssueTransformer::new(scope);

    match transformer.on_response_start(declared_length(&parts.headers, &body), parts.status) {
        Decision::Continue => return Response::from_parts(parts, body),
        Decision::Reject(err) => return err.into_response(),
        Decision::Hold | Decision::Replace(_) => {}
    }

    loop {
        let (chunk, is_last) = match body.frame().await {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) => (data, false),
                // Trailers carry nothing to sign.
                Err(_) => continue,
            },
            Some(Err(err)) => {
                let err = JwtError::UpstreamBody(err.to_string());
                tracing::error!(error = %err, "jwt_issue: upstream body failed");
                return err.into_response();
            }
            None => (Bytes::new(), true),
        };

        match transformer.on_response_chunk(chunk, is_last) {
            Decision::Replace(token) => {
                parts.headers.remove(TRANSFER_ENCODING);
                parts
                    .headers
                    .insert(CONTENT_LENGTH, HeaderValue::from(token.len()));
                return Response::from_parts(parts, Body::from(token));
            }
            Decision::Reject(err) => return err.into_response(),
            Decision::Hold | Decision::Continue if !is_last => {}
            _ => return JwtError::NotReady.into_response(),
        }
    }
}

/// `Content-Length` if the upstream declared one, else the body's exact
/// size when it knows it.  `None` means a streamed body of unknown length.
fn declared_length(headers: &HeaderMap, body: &Body) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| body.size_hint().exact().and_then(|n| usize::try_from(n).ok()))
}

/// Installs both stages of a scope on a [`Router`].
///
/// Verification runs first on the way in; issuance last on the way out.
/// Like any `Router::layer`, it only wraps routes added before the call.
///
/// ```rust,no_run
/// use axum::{routing::{get, post}, Json, Router};
/// use axum_jwt_filter::{JwtConfig, JwtRouterExt, VerifiedClaims};
///
/// # fn example() -> Result<(), axum_jwt_filter::JwtError> {
/// let server = JwtConfig::new().key("shared-secret");
/// let login = JwtConfig::new().issue(true).merge(&server).build()?;
/// let api = JwtConfig::new().verify(true).merge(&server).build()?;
///
/// let app: Router = Router::new()
///     .route("/login", post(|| async { Json(serde_json::json!({"sub": "alice"})) }))
///     .with_jwt(&login)
///     .merge(
///         Router::new()
///             .route("/me", get(|VerifiedClaims(c): VerifiedClaims| async move { c.to_string() }))
///             .with_jwt(&api),
///     );
/// # Ok(())
/// # }
/// ```
pub trait JwtRouterExt {
    fn with_jwt(self, scope: &JwtScope) -> Self;
}

impl<S> JwtRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_jwt(self, scope: &JwtScope) -> Self {
        self.layer(from_fn_with_state(scope.clone(), issue_response))
            .layer(from_fn_with_state(scope.clone(), verify_request))
    }
}

/// Axum extractor: the claims the verification gate injected.
///
/// Rejects with `401` when the request carries no trusted claims.  Only
/// meaningful on routes behind [`verify_request`], which guarantees the
/// `Authorization` header holds verified claims or is absent.
#[derive(Debug, Clone)]
pub struct VerifiedClaims(pub ClaimSet);

impl<S> FromRequestParts<S> for VerifiedClaims
where
    S: Send + Sync,
{
    type Rejection = JwtError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(JwtError::MissingClaims)?
            .to_str()
            .map_err(|_| JwtError::MissingClaims)?;

        ClaimSet::from_header_value(value).map(Self)
    }
}

/// Like [`VerifiedClaims`] but yields `None` when no `Authorization`
/// header is present.  A header that does not hold claims is still an error.
#[derive(Debug, Clone)]
pub struct OptionalVerifiedClaims(Option<ClaimSet>);

impl OptionalVerifiedClaims {
    pub fn into_inner(self) -> Option<ClaimSet> {
        self.0
    }
    pub fn as_ref(&self) -> Option<&ClaimSet> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for OptionalVerifiedClaims
where
    S: Send + Sync,
{
    type Rejection = JwtError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.get(AUTHORIZATION).is_none() {
            return Ok(Self(None));
        }
        VerifiedClaims::from_request_parts(parts, state)
            .await
            .map(|VerifiedClaims(claims)| Self(Some(claims)))
    }
}
