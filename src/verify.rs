use http::header::{AUTHORIZATION, COOKIE};
use http::{HeaderMap, HeaderValue};

use crate::config::JwtScope;
use crate::filter::{AccessFilter, Decision};
use crate::token::verify_token;

/// Cookie consulted when the request carries no `Authorization` header.
pub const AUTHORIZATION_COOKIE: &str = "authorization";

/// Where a candidate token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Header,
    Cookie,
}

/// Verifies the presented token and rewrites `Authorization` to carry its
/// claims: base64 of the canonical claim JSON.
///
/// The gate fails open.  A missing, malformed, forged or `alg: none` token
/// lets the request through with no `Authorization` header at all; the
/// failure is only logged.  Downstream authorization decides what an
/// unauthenticated request may do.  The one hard failure is a scope with
/// verification enabled but no key.
#[derive(Debug, Clone)]
pub struct VerifyGate {
    scope: JwtScope,
}

impl VerifyGate {
    pub fn new(scope: JwtScope) -> Self {
        Self { scope }
    }
}

impl AccessFilter for VerifyGate {
    fn on_request_access_check(&self, headers: &mut HeaderMap) -> Decision {
        if !self.scope.verify_enabled() {
            return Decision::Continue;
        }

        let key = match self.scope.key() {
            Ok(key) => key,
            Err(err) => {
                tracing::error!(error = %err, "jwt_verify: missing 'key' or 'key_file'");
                return Decision::Reject(err);
            }
        };

        let Some((token, source)) = take_token(headers) else {
            tracing::debug!("jwt_verify: no 'authorization' header or cookie");
            return Decision::Continue;
        };
        tracing::debug!(source = ?source, "jwt_verify: found token");

        let claims = match verify_token(&token, key) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::error!(error = %err, source = ?source, "jwt_verify: token rejected");
                return Decision::Continue;
            }
        };

        match HeaderValue::from_str(&claims.to_header_value()) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
                tracing::debug!(claims = claims.len(), "jwt_verify: claims injected");
            }
            Err(err) => tracing::error!(error = %err, "jwt_verify: cannot encode claims header"),
        }
        Decision::Continue
    }
}

/// Pull the candidate token out of the request.
///
/// A header is consumed: it is removed so that the raw token never reaches
/// downstream code.  Cookies are left in place.
fn take_token(headers: &mut HeaderMap) -> Option<(String, TokenSource)> {
    if let Some(value) = headers.remove(AUTHORIZATION) {
        let token = value.to_str().ok().map(strip_bearer).unwrap_or_default();
        return Some((token.to_owned(), TokenSource::Header));
    }

    find_cookie(headers, AUTHORIZATION_COOKIE).map(|token| (token, TokenSource::Cookie))
}

/// Accept both a bare token and `Bearer <token>`.
fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => value,
    }
}

/// First cookie named `name` across every `Cookie` header line.
fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|line| line.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(cookie, _)| *cookie == name)
        .map(|(_, value)| value.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::claims::ClaimSet;
    use crate::error::JwtError;
    use crate::config::JwtConfig;
    use crate::key::{Key, SigningAlgorithm};
    use crate::token::issue_token;

    const SECRET: &str = "verify-secret";

    fn gate() -> VerifyGate {
        VerifyGate::new(
            JwtConfig::new()
                .key(SECRET)
                .verify(true)
                .build()
                .unwrap(),
        )
    }

    fn token(json: &str) -> String {
        let key = Key::from_bytes(SECRET, SigningAlgorithm::HS512);
        let claims = ClaimSet::from_json(json.as_bytes()).unwrap();
        issue_token(&claims, SigningAlgorithm::HS512, Some(&key)).unwrap()
    }

    fn injected(headers: &HeaderMap) -> Option<ClaimSet> {
        headers
            .get(AUTHORIZATION)
            .map(|v| ClaimSet::from_header_value(v.to_str().unwrap()).unwrap())
    }

    #[test]
    fn header_token_is_replaced_by_claims() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token(r#"{"sub":"alice"}"#).parse().unwrap());

        assert!(matches!(
            gate().on_request_access_check(&mut headers),
            Decision::Continue
        ));
        let claims = injected(&headers).unwrap();
        assert_eq!(claims.subject(), Some("alice"));
        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn bearer_prefix_is_accepted() {
        let mut headers = HeaderMap::new();
        let value = format!("bearer {}", token(r#"{"sub":"alice"}"#));
        headers.insert(AUTHORIZATION, value.parse().unwrap());

        gate().on_request_access_check(&mut headers);
        assert_eq!(injected(&headers).unwrap().subject(), Some("alice"));
    }

    #[test]
    fn cookie_is_used_when_header_is_absent() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, "theme=dark".parse().unwrap());
        let line = format!("lang=en; authorization={}", token(r#"{"sub":"carol"}"#));
        headers.append(COOKIE, line.parse().unwrap());
        headers.append(
            COOKIE,
            format!("authorization={}", token(r#"{"sub":"dave"}"#))
                .parse()
                .unwrap(),
        );

        gate().on_request_access_check(&mut headers);
        assert_eq!(injected(&headers).unwrap().subject(), Some("carol"));
        assert_eq!(headers.get_all(COOKIE).iter().count(), 3);
    }

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token(r#"{"sub":"alice"}"#).parse().unwrap());
        headers.insert(
            COOKIE,
            format!("authorization={}", token(r#"{"sub":"bob"}"#))
                .parse()
                .unwrap(),
        );

        gate().on_request_access_check(&mut headers);
        assert_eq!(injected(&headers).unwrap().subject(), Some("alice"));
    }

    #[test]
    fn missing_token_leaves_headers_untouched() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "session=abc".parse().unwrap());
        let before = headers.clone();

        assert!(matches!(
            gate().on_request_access_check(&mut headers),
            Decision::Continue
        ));
        assert_eq!(headers, before);
    }

    #[test]
    fn forged_token_fails_open_without_claims() {
        let mut headers = HeaderMap::new();
        let key = Key::from_bytes("other-secret", SigningAlgorithm::HS512);
        let claims = ClaimSet::from_json(br#"{"sub":"mallory"}"#).unwrap();
        let forged = issue_token(&claims, SigningAlgorithm::HS512, Some(&key)).unwrap();
        headers.insert(AUTHORIZATION, forged.parse().unwrap());

        assert!(matches!(
            gate().on_request_access_check(&mut headers),
            Decision::Continue
        ));
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn alg_none_injects_nothing() {
        let mut headers = HeaderMap::new();
        let claims = ClaimSet::from_json(br#"{"sub":"mallory"}"#).unwrap();
        let unsecured = issue_token(&claims, SigningAlgorithm::None, None).unwrap();
        headers.insert(AUTHORIZATION, unsecured.parse().unwrap());

        // Even a scope that issues with `none` refuses to verify it.
        let scope = JwtConfig::new()
            .key(SECRET)
            .issue_algorithm(SigningAlgorithm::None)
            .verify(true)
            .build()
            .unwrap();
        VerifyGate::new(scope).on_request_access_check(&mut headers);
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn public_key_scope_verifies_rsa_and_ignores_hmac_forgery() {
        let public = include_str!("../testdata/rsa_public.pem");
        let private = include_str!("../testdata/rsa_private.pem");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(public.as_bytes()).unwrap();
        let gate = VerifyGate::new(
            JwtConfig::new()
                .key_file(file.path())
                .verify(true)
                .build()
                .unwrap(),
        );

        let signer = Key::from_bytes(private, SigningAlgorithm::RS256);
        let claims = ClaimSet::from_json(br#"{"sub":"alice"}"#).unwrap();
        let legit = issue_token(&claims, SigningAlgorithm::RS256, Some(&signer)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, legit.parse().unwrap());
        gate.on_request_access_check(&mut headers);
        assert_eq!(injected(&headers).unwrap().subject(), Some("alice"));

        // The public PEM is known to everyone; it must not work as an HMAC secret.
        let forger = Key::from_bytes(public, SigningAlgorithm::HS256);
        let claims = ClaimSet::from_json(br#"{"sub":"mallory"}"#).unwrap();
        let forged = issue_token(&claims, SigningAlgorithm::HS256, Some(&forger)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, forged.parse().unwrap());
        gate.on_request_access_check(&mut headers);
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn missing_key_rejects() {
        let scope = JwtConfig::new().verify(true).build().unwrap();
        let mut headers = HeaderMap::new();
        let decision = VerifyGate::new(scope).on_request_access_check(&mut headers);
        assert!(matches!(decision, Decision::Reject(JwtError::Config(_))));
    }

    #[test]
    fn disabled_gate_does_nothing() {
        let scope = JwtConfig::new().key(SECRET).build().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "raw".parse().unwrap());
        VerifyGate::new(scope).on_request_access_check(&mut headers);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "raw");
    }

    #[test]
    fn same_token_twice_gives_same_header() {
        let token = token(r#"{"sub":"alice","scope":["read","write"]}"#);
        let mut outputs = Vec::new();
        for _ in 0..2 {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, token.parse().unwrap());
            gate().on_request_access_check(&mut headers);
            outputs.push(headers.get(AUTHORIZATION).cloned().unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn strips_bearer_scheme_only() {
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("BEARER  abc "), "abc");
        assert_eq!(strip_bearer("abc"), "abc");
        assert_eq!(strip_bearer("Basic abc"), "Basic abc");
    }

    #[test]
    fn cookie_lookup_is_exact() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "xauthorization=1; authorization=2".parse().unwrap());
        assert_eq!(find_cookie(&headers, "authorization").as_deref(), Some("2"));
        assert_eq!(find_cookie(&headers, "missing"), None);
    }
}
