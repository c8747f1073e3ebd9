use bytes::Bytes;
use http::StatusCode;

use crate::accumulator::BodyAccumulator;
use crate::claims::ClaimSet;
use crate::config::JwtScope;
use crate::error::JwtError;
use crate::filter::{Decision, ResponseFilter};
use crate::token::issue_token;

/// Turns a successful JSON response into a signed token.
///
/// One transformer is created per response and owns that response's
/// accumulation buffer; dropping it (on success, rejection, or because the
/// host abandoned the response) releases everything it buffered.
///
/// The transformer engages only when issuance is enabled, the status is
/// `200 OK` and a body is present.  Otherwise every hook answers
/// [`Decision::Continue`] and the response passes through untouched.
#[derive(Debug)]
pub struct IssueTransformer {
    scope: JwtScope,
    accumulator: Option<BodyAccumulator>,
}

impl IssueTransformer {
    pub fn new(scope: JwtScope) -> Self {
        Self {
            scope,
            accumulator: None,
        }
    }

    /// Whether the response is being buffered for issuance.
    pub fn is_active(&self) -> bool {
        self.accumulator.is_some()
    }

    fn reject(&mut self, err: JwtError) -> Decision {
        tracing::error!(error = %err, "jwt_issue: rejecting response");
        self.accumulator = None;
        Decision::Reject(err)
    }

    fn finish(&self, accumulator: BodyAccumulator) -> Result<Bytes, JwtError> {
        let body = accumulator.into_bytes()?;
        let claims = ClaimSet::from_json(&body)?;
        let token = issue_token(&claims, self.scope.issue_algorithm(), self.scope.issue_key()?)?;

        tracing::debug!(
            algorithm = %self.scope.issue_algorithm(),
            body_len = body.len(),
            token_len = token.len(),
            "jwt_issue: issued token"
        );
        Ok(Bytes::from(token))
    }
}

impl ResponseFilter for IssueTransformer {
    fn on_response_start(&mut self, declared_length: Option<usize>, status: StatusCode) -> Decision {
        if !self.scope.issue_enabled() || status != StatusCode::OK || declared_length == Some(0) {
            return Decision::Continue;
        }

        // Fail before buffering anything if signing cannot succeed.
        if let Err(err) = self.scope.issue_key() {
            return self.reject(err);
        }

        let mut accumulator = BodyAccumulator::new();
        if let Err(err) = accumulator.begin(declared_length, self.scope.issue_buffer_size()) {
            return self.reject(err);
        }

        tracing::debug!(
            declared_length = ?declared_length,
            capacity = accumulator.capacity(),
            "jwt_issue: buffering response body"
        );
        self.accumulator = Some(accumulator);
        Decision::Hold
    }

    fn on_response_chunk(&mut self, chunk: Bytes, is_last: bool) -> Decision {
        let Some(accumulator) = self.accumulator.as_mut() else {
            return Decision::Continue;
        };

        if let Err(err) = accumulator.push(&chunk, is_last) {
            return self.reject(err);
        }
        if !is_last {
            return Decision::Hold;
        }

        let Some(accumulator) = self.accumulator.take() else {
            return Decision::Reject(JwtError::NotReady);
        };
        match self.finish(accumulator) {
            Ok(token) => Decision::Replace(token),
            Err(err) => self.reject(err),
        }
    }
}
