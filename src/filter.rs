//! The stage contract the host pipeline drives.
//!
//! Each stage is a plain value owned by one request.  The host calls its
//! hooks in order and acts on the returned [`Decision`]; stages never see
//! each other and never outlive the request they were created for.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::error::JwtError;

/// What the host should do after a stage hook returns.
#[derive(Debug)]
pub enum Decision {
    /// Forward the original headers or data unchanged.
    Continue,
    /// The stage kept the data; forward nothing yet.
    Hold,
    /// Forward this complete body instead of the original one and declare
    /// its length as the content length.
    Replace(Bytes),
    /// Abort with `JwtError::status()`.
    Reject(JwtError),
}

impl Decision {
    /// Status the host answers with, for a rejection.
    pub fn reject_status(&self) -> Option<StatusCode> {
        match self {
            Decision::Reject(err) => Some(err.status()),
            _ => None,
        }
    }
}

/// A stage that sees the upstream response on its way out.
pub trait ResponseFilter {
    fn on_response_start(&mut self, declared_length: Option<usize>, status: StatusCode) -> Decision;

    fn on_response_chunk(&mut self, chunk: Bytes, is_last: bool) -> Decision;
}

/// A stage run during the access phase of a request.
///
/// Cookies are read from the same header map.  Implementations may rewrite
/// headers but are expected to reject only on misconfiguration.
pub trait AccessFilter {
    fn on_request_access_check(&self, headers: &mut HeaderMap) -> Decision;
}
