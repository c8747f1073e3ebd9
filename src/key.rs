use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use p521::pkcs8::{DecodePrivateKey, DecodePublicKey};
use zeroize::Zeroizing;

use crate::error::JwtError;

/// Algorithm a scope issues tokens with.
///
/// `None` produces unsecured tokens and is only ever honoured on the
/// issuance side.  Verification refuses it unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigningAlgorithm {
    None,
    HS256,
    HS384,
    #[default]
    HS512,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    ES512,
}

/// The kind of key material an algorithm signs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Unsecured,
    Hmac,
    Rsa,
    Ec,
}

const ALGORITHMS: [(SigningAlgorithm, &str); 10] = [
    (SigningAlgorithm::None, "none"),
    (SigningAlgorithm::HS256, "HS256"),
    (SigningAlgorithm::HS384, "HS384"),
    (SigningAlgorithm::HS512, "HS512"),
    (SigningAlgorithm::RS256, "RS256"),
    (SigningAlgorithm::RS384, "RS384"),
    (SigningAlgorithm::RS512, "RS512"),
    (SigningAlgorithm::ES256, "ES256"),
    (SigningAlgorithm::ES384, "ES384"),
    (SigningAlgorithm::ES512, "ES512"),
];

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        ALGORITHMS
            .iter()
            .find(|(alg, _)| alg == self)
            .map(|(_, name)| *name)
            .unwrap_or("none")
    }

    pub fn family(&self) -> KeyFamily {
        match self {
            Self::None => KeyFamily::Unsecured,
            Self::HS256 | Self::HS384 | Self::HS512 => KeyFamily::Hmac,
            Self::RS256 | Self::RS384 | Self::RS512 => KeyFamily::Rsa,
            Self::ES256 | Self::ES384 | Self::ES512 => KeyFamily::Ec,
        }
    }

    /// Whether issuing with this algorithm needs key material.
    pub fn requires_key(&self) -> bool {
        *self != Self::None
    }

    /// The `jsonwebtoken` algorithm, if the backend can sign with it.
    ///
    /// `None` and `ES512` are encoded by hand.
    pub fn to_jwt(&self) -> Option<Algorithm> {
        match self {
            Self::None | Self::ES512 => Option::None,
            Self::HS256 => Some(Algorithm::HS256),
            Self::HS384 => Some(Algorithm::HS384),
            Self::HS512 => Some(Algorithm::HS512),
            Self::RS256 => Some(Algorithm::RS256),
            Self::RS384 => Some(Algorithm::RS384),
            Self::RS512 => Some(Algorithm::RS512),
            Self::ES256 => Some(Algorithm::ES256),
            Self::ES384 => Some(Algorithm::ES384),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    /// Names match case-insensitively, as nginx enum directives do.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALGORITHMS
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(alg, _)| *alg)
            .ok_or_else(|| JwtError::Config(format!("unknown issue algorithm {s:?}")))
    }
}

/// Where a scope's key material comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    Inline(Vec<u8>),
    File(PathBuf),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(bytes) => write!(f, "Inline({} bytes)", bytes.len()),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// One immutable signing/verification key, loaded once per scope.
///
/// The algorithm tag fixes which tokens the key verifies.  A key tagged
/// `None` is untagged: its family is inferred from the material.
///
/// The material is wiped from memory when the key is dropped.
pub struct Key {
    material: Zeroizing<Vec<u8>>,
    algorithm: SigningAlgorithm,
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("algorithm", &self.algorithm)
            .field("len", &self.material.len())
            .finish_non_exhaustive()
    }
}

impl Key {
    /// Read the full key material from `source`.
    ///
    /// A file that yields fewer bytes than its reported size is treated as
    /// truncated and rejected.
    pub fn load(source: &KeySource, algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        let material = match source {
            KeySource::Inline(bytes) => Zeroizing::new(bytes.clone()),
            KeySource::File(path) => read_key_file(path)?,
        };
        Ok(Self {
            material,
            algorithm,
        })
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>, algorithm: SigningAlgorithm) -> Self {
        Self {
            material: Zeroizing::new(bytes.into()),
            algorithm,
        }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    pub fn len(&self) -> usize {
        self.material.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material.is_empty()
    }

    fn is_pem(&self) -> bool {
        self.material.trim_ascii_start().starts_with(b"-----BEGIN")
    }

    /// Families this key verifies.  A key tagged `none` has its family
    /// inferred from the material: PEM is asymmetric, anything else HMAC.
    fn verification_families(&self) -> &'static [KeyFamily] {
        match self.algorithm.family() {
            KeyFamily::Unsecured if self.is_pem() => &[KeyFamily::Rsa, KeyFamily::Ec],
            KeyFamily::Unsecured | KeyFamily::Hmac => &[KeyFamily::Hmac],
            KeyFamily::Rsa => &[KeyFamily::Rsa],
            KeyFamily::Ec => &[KeyFamily::Ec],
        }
    }

    /// Whether a token signed with `alg` may be checked against this key.
    pub fn accepts(&self, alg: SigningAlgorithm) -> bool {
        self.verification_families().contains(&alg.family())
    }

    fn pem(&self) -> Result<&str, String> {
        std::str::from_utf8(&self.material).map_err(|_| "PEM is not valid UTF-8".to_string())
    }

    /// Signing key for `algorithm`, read from this key's material.
    pub(crate) fn encoding_key(&self, algorithm: SigningAlgorithm) -> Result<EncodingKey, JwtError> {
        match algorithm.family() {
            KeyFamily::Hmac => Ok(EncodingKey::from_secret(&self.material)),
            KeyFamily::Rsa => EncodingKey::from_rsa_pem(&self.material)
                .map_err(|e| JwtError::Signing(format!("invalid RSA private key: {e}"))),
            KeyFamily::Ec => EncodingKey::from_ec_pem(&self.material)
                .map_err(|e| JwtError::Signing(format!("invalid EC private key: {e}"))),
            KeyFamily::Unsecured => Err(JwtError::Signing(
                "algorithm none does not sign with a key".into(),
            )),
        }
    }

    pub(crate) fn decoding_key(&self, alg: Algorithm) -> Result<DecodingKey, JwtError> {
        match jwt_family(alg) {
            Some(KeyFamily::Hmac) => Ok(DecodingKey::from_secret(&self.material)),
            Some(KeyFamily::Rsa) => DecodingKey::from_rsa_pem(&self.material)
                .map_err(|e| JwtError::TokenDecode(format!("invalid RSA public key: {e}"))),
            Some(KeyFamily::Ec) => DecodingKey::from_ec_pem(&self.material)
                .map_err(|e| JwtError::TokenDecode(format!("invalid EC public key: {e}"))),
            _ => Err(JwtError::UntrustedAlgorithm(format!("{alg:?}"))),
        }
    }

    /// P-521 signing key from a PKCS#8 PEM private key.
    pub(crate) fn es512_signing_key(&self) -> Result<p521::ecdsa::SigningKey, JwtError> {
        let invalid = |e: String| JwtError::Signing(format!("invalid P-521 private key: {e}"));

        let secret = p521::SecretKey::from_pkcs8_pem(self.pem().map_err(invalid)?)
            .map_err(|e| invalid(e.to_string()))?;
        p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes()).map_err(|e| invalid(e.to_string()))
    }

    /// P-521 verifying key from an SPKI PEM public key.
    pub(crate) fn es512_verifying_key(&self) -> Result<p521::ecdsa::VerifyingKey, JwtError> {
        let invalid = |e: String| JwtError::TokenDecode(format!("invalid P-521 public key: {e}"));

        let public = p521::PublicKey::from_public_key_pem(self.pem().map_err(invalid)?)
            .map_err(|e| invalid(e.to_string()))?;
        p521::ecdsa::VerifyingKey::from_sec1_bytes(&public.to_sec1_bytes())
            .map_err(|e| invalid(e.to_string()))
    }
}

fn jwt_family(alg: Algorithm) -> Option<KeyFamily> {
    match alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Some(KeyFamily::Hmac),
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => Some(KeyFamily::Rsa),
        Algorithm::ES256 | Algorithm::ES384 => Some(KeyFamily::Ec),
        _ => None,
    }
}

fn read_key_file(path: &Path) -> Result<Zeroizing<Vec<u8>>, JwtError> {
    let fail = |reason: String| JwtError::KeyLoad {
        path: path.display().to_string(),
        reason,
    };

    let mut file = File::open(path).map_err(|e| fail(e.to_string()))?;
    let expected = file.metadata().map_err(|e| fail(e.to_string()))?.len();

    let mut material = Zeroizing::new(Vec::with_capacity(expected as usize));
    file.read_to_end(&mut material)
        .map_err(|e| fail(e.to_string()))?;

    if (material.len() as u64) < expected {
        return Err(fail("unexpected end of file".into()));
    }

    tracing::debug!(path = %path.display(), len = material.len(), "loaded key file");
    Ok(material)
}
