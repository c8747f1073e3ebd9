use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

/// Errors from JWT issuance, verification and key loading.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT not configured: {0}")]
    Config(String),

    #[error("Cannot load key from {path}: {reason}")]
    KeyLoad { path: String, reason: String },

    #[error("Cannot issue token from too large body, max is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Response body is not a JSON object: {0}")]
    InvalidIssuancePayload(String),

    #[error("Cannot sign token: {0}")]
    Signing(String),

    #[error("Upstream body failed: {0}")]
    UpstreamBody(String),

    #[error("Body is not complete")]
    NotReady,

    #[error("Invalid token: {0}")]
    TokenDecode(String),

    #[error("Untrusted token algorithm {0:?}")]
    UntrustedAlgorithm(String),

    #[error("Missing verified claims")]
    MissingClaims,
}

impl JwtError {
    /// HTTP status a rejected request or response is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            JwtError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            JwtError::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
            JwtError::TokenDecode(_)
            | JwtError::UntrustedAlgorithm(_)
            | JwtError::MissingClaims => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for JwtError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = ErrorBody {
            error: self.to_string(),
            status: status.as_u16(),
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_limit_maps_to_413() {
        let err = JwtError::PayloadTooLarge { limit: 10 };
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            err.to_string(),
            "Cannot issue token from too large body, max is 10 bytes"
        );
    }

    #[test]
    fn issuance_failures_are_server_errors() {
        for err in [
            JwtError::Config("missing key".into()),
            JwtError::InvalidIssuancePayload("eof".into()),
            JwtError::Signing("bad key".into()),
            JwtError::NotReady,
        ] {
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn response_carries_status() {
        let res = JwtError::MissingClaims.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
