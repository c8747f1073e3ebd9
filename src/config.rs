use std::path::PathBuf;
use std::sync::Arc;

use crate::error::JwtError;
use crate::key::{Key, KeySource, SigningAlgorithm};

/// Default ceiling for a response body turned into a token: 1 MiB.
pub const DEFAULT_ISSUE_BUFFER_SIZE: usize = 1024 * 1024;

/// Options for one configuration scope.
///
/// Every field is optional so that scopes can be layered: a route-level
/// config [`merge`](Self::merge)s over a server-level one, and whatever is
/// still unset falls back to the defaults in [`build`](Self::build).
///
/// ```rust
/// use axum_jwt_filter::{JwtConfig, SigningAlgorithm};
///
/// let server = JwtConfig::new().key("shared-secret");
/// let login = JwtConfig::new()
///     .issue(true)
///     .issue_algorithm(SigningAlgorithm::HS256)
///     .merge(&server);
///
/// let scope = login.build().unwrap();
/// assert!(scope.issue_enabled());
/// assert!(!scope.verify_enabled());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JwtConfig {
    /// Inline key or key file; the two are mutually exclusive.
    pub key: Option<KeySource>,
    pub issue: Option<bool>,
    pub issue_algorithm: Option<SigningAlgorithm>,
    pub issue_buffer_size: Option<usize>,
    pub verify: Option<bool>,
}

impl JwtConfig {
    /// Empty config: everything unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from environment variables already set in the process.
    ///
    /// | Variable                | Default | Notes                                  |
    /// |-------------------------|---------|----------------------------------------|
    /// | `JWT_KEY`               | unset   | Inline key; excludes `JWT_KEY_FILE`    |
    /// | `JWT_KEY_FILE`          | unset   | Path read once by [`build`](Self::build) |
    /// | `JWT_ISSUE`             | `off`   | `on`/`true`/`1` enables issuance       |
    /// | `JWT_ISSUE_ALGORITHM`   | `HS512` | `none`, `HS*`, `RS*`, `ES*`            |
    /// | `JWT_ISSUE_BUFFER_SIZE` | `1m`    | Bytes, optional `k`/`m`/`g` suffix     |
    /// | `JWT_VERIFY`            | `off`   | `on`/`true`/`1` enables verification   |
    ///
    /// This crate does **not** load `.env` files.
    pub fn from_env() -> Result<Self, JwtError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through `var`.
    /// Empty values count as unset.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, JwtError> {
        let get = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        let key = match (get("JWT_KEY"), get("JWT_KEY_FILE")) {
            (Some(_), Some(_)) => {
                return Err(JwtError::Config(
                    "JWT_KEY and JWT_KEY_FILE are mutually exclusive".into(),
                ))
            }
            (Some(key), None) => Some(KeySource::Inline(key.into_bytes())),
            (None, Some(path)) => Some(KeySource::File(PathBuf::from(path))),
            (None, None) => None,
        };

        Ok(Self {
            key,
            issue: get("JWT_ISSUE").map(|v| parse_flag(&v)).transpose()?,
            issue_algorithm: get("JWT_ISSUE_ALGORITHM").map(|v| v.parse()).transpose()?,
            issue_buffer_size: get("JWT_ISSUE_BUFFER_SIZE")
                .map(|v| parse_size(&v))
                .transpose()?,
            verify: get("JWT_VERIFY").map(|v| parse_flag(&v)).transpose()?,
        })
    }

    /// Fill every unset option from `parent`.
    pub fn merge(mut self, parent: &JwtConfig) -> Self {
        if self.key.is_none() {
            self.key = parent.key.clone();
        }
        self.issue = self.issue.or(parent.issue);
        self.issue_algorithm = self.issue_algorithm.or(parent.issue_algorithm);
        self.issue_buffer_size = self.issue_buffer_size.or(parent.issue_buffer_size);
        self.verify = self.verify.or(parent.verify);
        self
    }

    /// Resolve defaults and load the key, once, into an immutable scope.
    ///
    /// The `HS512` default applies to issuance only.  Without an explicit
    /// `issue_algorithm` the key verifies tokens of its own family: `HS*`
    /// for a raw secret, `RS*`/`ES*` for a PEM key.
    ///
    /// An empty key counts as no key at all.  A scope without a key still
    /// builds; requests that need the key then fail with
    /// [`JwtError::Config`].
    pub fn build(&self) -> Result<JwtScope, JwtError> {
        let issue_algorithm = self.issue_algorithm.unwrap_or_default();

        // The key is tagged only with an explicit algorithm.  Left untagged,
        // it verifies whatever family its material belongs to.
        let key_algorithm = self.issue_algorithm.unwrap_or(SigningAlgorithm::None);
        let key = match &self.key {
            Some(source) => Some(Key::load(source, key_algorithm)?),
            None => None,
        }
        .filter(|key| !key.is_empty())
        .map(Arc::new);

        let scope = JwtScope {
            issue: self.issue.unwrap_or(false),
            issue_algorithm,
            issue_buffer_size: self.issue_buffer_size.unwrap_or(DEFAULT_ISSUE_BUFFER_SIZE),
            verify: self.verify.unwrap_or(false),
            key,
        };

        let needs_key = scope.verify || (scope.issue && issue_algorithm.requires_key());
        if needs_key && scope.key.is_none() {
            tracing::warn!(
                issue = scope.issue,
                verify = scope.verify,
                "jwt scope has no key; requests needing one will fail"
            );
        }
        tracing::debug!(
            issue = scope.issue,
            issue_algorithm = %scope.issue_algorithm,
            issue_buffer_size = scope.issue_buffer_size,
            verify = scope.verify,
            "jwt scope ready"
        );

        Ok(scope)
    }

    pub fn key(mut self, v: impl Into<Vec<u8>>) -> Self {
        self.key = Some(KeySource::Inline(v.into()));
        self
    }
    pub fn key_file(mut self, v: impl Into<PathBuf>) -> Self {
        self.key = Some(KeySource::File(v.into()));
        self
    }
    pub fn issue(mut self, v: bool) -> Self {
        self.issue = Some(v);
        self
    }
    pub fn issue_algorithm(mut self, v: SigningAlgorithm) -> Self {
        self.issue_algorithm = Some(v);
        self
    }
    pub fn issue_buffer_size(mut self, v: usize) -> Self {
        self.issue_buffer_size = Some(v);
        self
    }
    pub fn verify(mut self, v: bool) -> Self {
        self.verify = Some(v);
        self
    }
}

/// A resolved configuration scope, shared read-only by every request.
///
/// Cloning is cheap; the key sits behind an `Arc`.
#[derive(Debug, Clone)]
pub struct JwtScope {
    issue: bool,
    issue_algorithm: SigningAlgorithm,
    issue_buffer_size: usize,
    verify: bool,
    key: Option<Arc<Key>>,
}

impl JwtScope {
    pub fn issue_enabled(&self) -> bool {
        self.issue
    }

    pub fn verify_enabled(&self) -> bool {
        self.verify
    }

    pub fn issue_algorithm(&self) -> SigningAlgorithm {
        self.issue_algorithm
    }

    pub fn issue_buffer_size(&self) -> usize {
        self.issue_buffer_size
    }

    /// The scope's key, or [`JwtError::Config`] when none is configured.
    pub fn key(&self) -> Result<&Key, JwtError> {
        self.key
            .as_deref()
            .ok_or_else(|| JwtError::Config("missing 'key' or 'key_file'".into()))
    }

    /// The key issuance signs with; `None` only for the `none` algorithm.
    pub fn issue_key(&self) -> Result<Option<&Key>, JwtError> {
        if self.issue_algorithm.requires_key() {
            self.key().map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Parse an on/off flag.
pub fn parse_flag(value: &str) -> Result<bool, JwtError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        other => Err(JwtError::Config(format!("invalid flag {other:?}"))),
    }
}

/// Parse a byte size with an optional `k`, `m` or `g` suffix, e.g. `512k`.
pub fn parse_size(value: &str) -> Result<usize, JwtError> {
    let value = value.trim();
    let invalid = || JwtError::Config(format!("invalid size {value:?}"));

    let (digits, scale) = match value.char_indices().last() {
        Some((i, 'k' | 'K')) => (&value[..i], 1024),
        Some((i, 'm' | 'M')) => (&value[..i], 1024 * 1024),
        Some((i, 'g' | 'G')) => (&value[..i], 1024 * 1024 * 1024),
        _ => (value, 1),
    };

    digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(scale))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    use crate::claims::ClaimSet;
    use crate::token::{issue_token, verify_token};

    const RSA_PRIVATE: &str = include_str!("../testdata/rsa_private.pem");
    const RSA_PUBLIC: &str = include_str!("../testdata/rsa_public.pem");
    const EC256_PRIVATE: &str = include_str!("../testdata/ec256_private.pem");
    const EC256_PUBLIC: &str = include_str!("../testdata/ec256_public.pem");
    const EC521_PRIVATE: &str = include_str!("../testdata/ec521_private.pem");
    const EC521_PUBLIC: &str = include_str!("../testdata/ec521_public.pem");

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let scope = JwtConfig::new().build().unwrap();
        assert!(!scope.issue_enabled());
        assert!(!scope.verify_enabled());
        assert_eq!(scope.issue_algorithm(), SigningAlgorithm::HS512);
        assert_eq!(scope.issue_buffer_size(), 1024 * 1024);
        assert!(matches!(scope.key(), Err(JwtError::Config(_))));
    }

    #[test]
    fn child_overrides_and_inherits() {
        let parent = JwtConfig::new()
            .key("parent-secret")
            .issue_buffer_size(64)
            .verify(true);
        let child = JwtConfig::new().verify(false).issue(true).merge(&parent);

        assert_eq!(child.key, Some(KeySource::Inline(b"parent-secret".to_vec())));
        assert_eq!(child.issue_buffer_size, Some(64));
        assert_eq!(child.verify, Some(false));
        assert_eq!(child.issue, Some(true));
        assert_eq!(child.issue_algorithm, None);
    }

    #[test]
    fn child_key_wins() {
        let parent = JwtConfig::new().key("parent");
        let child = JwtConfig::new().key_file("/etc/jwt.key").merge(&parent);
        assert_eq!(child.key, Some(KeySource::File("/etc/jwt.key".into())));
    }

    #[test]
    fn from_lookup_reads_every_option() {
        let cfg = JwtConfig::from_lookup(lookup(&[
            ("JWT_KEY", "s3cret"),
            ("JWT_ISSUE", "on"),
            ("JWT_ISSUE_ALGORITHM", "hs256"),
            ("JWT_ISSUE_BUFFER_SIZE", "512k"),
            ("JWT_VERIFY", "true"),
        ]))
        .unwrap();

        assert_eq!(cfg.key, Some(KeySource::Inline(b"s3cret".to_vec())));
        assert_eq!(cfg.issue, Some(true));
        assert_eq!(cfg.issue_algorithm, Some(SigningAlgorithm::HS256));
        assert_eq!(cfg.issue_buffer_size, Some(512 * 1024));
        assert_eq!(cfg.verify, Some(true));
    }

    #[test]
    fn from_lookup_empty_is_unset() {
        let cfg = JwtConfig::from_lookup(lookup(&[("JWT_KEY", ""), ("JWT_ISSUE", " ")])).unwrap();
        assert_eq!(cfg, JwtConfig::new());
    }

    #[test]
    fn key_and_key_file_are_exclusive() {
        let err = JwtConfig::from_lookup(lookup(&[
            ("JWT_KEY", "a"),
            ("JWT_KEY_FILE", "/tmp/b"),
        ]))
        .unwrap_err();
        assert!(matches!(err, JwtError::Config(_)));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for vars in [
            [("JWT_ISSUE", "maybe")],
            [("JWT_ISSUE_ALGORITHM", "PS256")],
            [("JWT_ISSUE_BUFFER_SIZE", "lots")],
        ] {
            assert!(matches!(
                JwtConfig::from_lookup(lookup(&vars)),
                Err(JwtError::Config(_))
            ));
        }
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("100").unwrap(), 100);
        assert_eq!(parse_size("4k").unwrap(), 4096);
        assert_eq!(parse_size("1M").unwrap(), 1024 * 1024);
        assert_eq!(parse_size(" 2g ").unwrap(), 2 * 1024 * 1024 * 1024);
        assert!(parse_size("").is_err());
        assert!(parse_size("k").is_err());
        assert!(parse_size("-1").is_err());
        assert!(parse_size("99999999999999999999g").is_err());
    }

    #[test]
    fn flags() {
        assert!(parse_flag("ON").unwrap());
        assert!(parse_flag("1").unwrap());
        assert!(!parse_flag("off").unwrap());
        assert!(!parse_flag("False").unwrap());
        assert!(parse_flag("2").is_err());
    }

    #[test]
    fn build_loads_key_file_once() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"from-file").unwrap();

        let scope = JwtConfig::new()
            .key_file(file.path())
            .verify(true)
            .build()
            .unwrap();
        // Later changes to the file do not reach the scope.
        file.write_all(b"-appended").unwrap();

        assert_eq!(scope.key().unwrap().len(), 9);
    }

    #[test]
    fn build_fails_on_missing_key_file() {
        let err = JwtConfig::new()
            .key_file("/nonexistent/jwt.key")
            .build()
            .unwrap_err();
        assert!(matches!(err, JwtError::KeyLoad { .. }));
    }

    #[test]
    fn empty_key_counts_as_missing() {
        let scope = JwtConfig::new().key("").verify(true).build().unwrap();
        assert!(matches!(scope.key(), Err(JwtError::Config(_))));
    }

    #[test]
    fn verify_only_scope_accepts_rsa_and_refuses_public_key_as_secret() {
        let mut public = tempfile::NamedTempFile::new().unwrap();
        public.write_all(RSA_PUBLIC.as_bytes()).unwrap();
        let scope = JwtConfig::new()
            .key_file(public.path())
            .verify(true)
            .build()
            .unwrap();
        let claims = ClaimSet::from_json(br#"{"sub":"alice"}"#).unwrap();

        let private = Key::from_bytes(RSA_PRIVATE, SigningAlgorithm::RS256);
        let legit = issue_token(&claims, SigningAlgorithm::RS256, Some(&private)).unwrap();
        assert_eq!(verify_token(&legit, scope.key().unwrap()).unwrap(), claims);

        let forger = Key::from_bytes(RSA_PUBLIC, SigningAlgorithm::HS256);
        let forged = issue_token(&claims, SigningAlgorithm::HS256, Some(&forger)).unwrap();
        assert!(matches!(
            verify_token(&forged, scope.key().unwrap()),
            Err(JwtError::UntrustedAlgorithm(_))
        ));
    }

    #[test]
    fn verify_only_scope_with_raw_secret_stays_hmac() {
        let scope = JwtConfig::new().key("secret").verify(true).build().unwrap();
        let key = scope.key().unwrap();
        assert_eq!(key.algorithm(), SigningAlgorithm::None);
        assert!(key.accepts(SigningAlgorithm::HS512));
        assert!(!key.accepts(SigningAlgorithm::RS256));
        assert_eq!(scope.issue_algorithm(), SigningAlgorithm::HS512);
    }

    #[test]
    fn ecdsa_scopes_issue_and_verify() {
        let claims = ClaimSet::from_json(br#"{"sub":"alice"}"#).unwrap();
        for (alg, private, public) in [
            (SigningAlgorithm::ES256, EC256_PRIVATE, EC256_PUBLIC),
            (SigningAlgorithm::ES512, EC521_PRIVATE, EC521_PUBLIC),
        ] {
            let issuing = JwtConfig::new()
                .key(private)
                .issue(true)
                .issue_algorithm(alg)
                .build()
                .unwrap();
            let verifying = JwtConfig::new().key(public).verify(true).build().unwrap();

            let token =
                issue_token(&claims, issuing.issue_algorithm(), issuing.issue_key().unwrap())
                    .unwrap();
            assert_eq!(verify_token(&token, verifying.key().unwrap()).unwrap(), claims);
        }
    }

    #[test]
    fn unsecured_issuance_needs_no_key() {
        let scope = JwtConfig::new()
            .issue(true)
            .issue_algorithm(SigningAlgorithm::None)
            .build()
            .unwrap();
        assert!(scope.issue_key().unwrap().is_none());

        let signed = JwtConfig::new().issue(true).build().unwrap();
        assert!(matches!(signed.issue_key(), Err(JwtError::Config(_))));
    }
}
