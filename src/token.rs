use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, decode_header, encode, Header, Validation};
use p521::ecdsa::signature::{Signer, Verifier};
use serde::Deserialize;

use crate::claims::ClaimSet;
use crate::error::JwtError;
use crate::key::{Key, SigningAlgorithm};

const UNSECURED_HEADER: &str = r#"{"alg":"none","typ":"JWT"}"#;
const ES512_HEADER: &str = r#"{"alg":"ES512","typ":"JWT"}"#;

/// Serialize `claims` as a compact token signed with `algorithm`.
///
/// `SigningAlgorithm::None` yields an unsecured token (empty signature) and
/// needs no key.  Every other algorithm needs `key`.
///
/// ```rust
/// use axum_jwt_filter::{issue_token, verify_token, ClaimSet, Key, SigningAlgorithm};
///
/// # fn main() -> Result<(), axum_jwt_filter::JwtError> {
/// let key = Key::from_bytes("secret", SigningAlgorithm::HS256);
/// let claims = ClaimSet::from_json(br#"{"sub":"alice"}"#)?;
///
/// let token = issue_token(&claims, SigningAlgorithm::HS256, Some(&key))?;
/// assert_eq!(verify_token(&token, &key)?, claims);
/// # Ok(())
/// # }
/// ```
pub fn issue_token(
    claims: &ClaimSet,
    algorithm: SigningAlgorithm,
    key: Option<&Key>,
) -> Result<String, JwtError> {
    if !algorithm.requires_key() {
        return Ok(encode_unsecured(claims));
    }

    let key = key.ok_or_else(|| JwtError::Config("missing key or key file".into()))?;
    if algorithm == SigningAlgorithm::ES512 {
        return encode_es512(claims, key);
    }

    let alg = algorithm.to_jwt().ok_or_else(|| {
        JwtError::Signing(format!("{algorithm} is not supported by the signing backend"))
    })?;

    encode(&Header::new(alg), claims, &key.encoding_key(algorithm)?)
        .map_err(|e| JwtError::Signing(e.to_string()))
}

/// Verify a compact token against `key` and return its claims.
///
/// Tokens declaring `alg: none` are refused before anything else is
/// checked, as are tokens whose algorithm is unknown or does not belong to
/// the key's family.  Registered time claims (`exp`, `nbf`) are not interpreted.
pub fn verify_token(token: &str, key: &Key) -> Result<ClaimSet, JwtError> {
    let token = token.trim();

    let declared = declared_algorithm(token)?;
    if declared.eq_ignore_ascii_case("none") {
        return Err(JwtError::UntrustedAlgorithm(declared));
    }

    let algorithm = match declared.parse::<SigningAlgorithm>() {
        Ok(algorithm) if key.accepts(algorithm) => algorithm,
        _ => return Err(JwtError::UntrustedAlgorithm(declared)),
    };
    if algorithm == SigningAlgorithm::ES512 {
        return verify_es512(token, key);
    }

    let header = decode_header(token).map_err(|e| JwtError::TokenDecode(e.to_string()))?;

    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<ClaimSet>(token, &key.decoding_key(header.alg)?, &validation)
        .map_err(|e| JwtError::TokenDecode(e.to_string()))?;

    Ok(data.claims)
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// The `alg` a token claims, read without trusting anything else in it.
fn declared_algorithm(token: &str) -> Result<String, JwtError> {
    let mut segments = token.split('.');
    let header = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(header), Some(_), Some(_), None) => header,
        _ => {
            return Err(JwtError::TokenDecode(
                "expected three dot-separated segments".into(),
            ))
        }
    };

    let json = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| JwtError::TokenDecode(format!("header is not base64url: {e}")))?;
    let raw: RawHeader = serde_json::from_slice(&json)
        .map_err(|e| JwtError::TokenDecode(format!("header is not valid JSON: {e}")))?;

    Ok(raw.alg)
}

/// ES512 is signed with P-521 directly; the signature is the fixed-size
/// `r || s` encoding.
fn encode_es512(claims: &ClaimSet, key: &Key) -> Result<String, JwtError> {
    let signing_key = key.es512_signing_key()?;
    let message = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(ES512_HEADER),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );

    let signature: p521::ecdsa::Signature = signing_key
        .try_sign(message.as_bytes())
        .map_err(|e| JwtError::Signing(e.to_string()))?;

    Ok(format!("{message}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes())))
}

fn verify_es512(token: &str, key: &Key) -> Result<ClaimSet, JwtError> {
    let (message, signature) = token
        .rsplit_once('.')
        .ok_or_else(|| JwtError::TokenDecode("missing signature".into()))?;
    let payload = message
        .split_once('.')
        .map(|(_, payload)| payload)
        .ok_or_else(|| JwtError::TokenDecode("missing payload".into()))?;

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| JwtError::TokenDecode(format!("signature is not base64url: {e}")))?;
    let signature = p521::ecdsa::Signature::from_slice(&signature)
        .map_err(|e| JwtError::TokenDecode(format!("malformed ES512 signature: {e}")))?;

    key.es512_verifying_key()?
        .verify(message.as_bytes(), &signature)
        .map_err(|_| JwtError::TokenDecode("InvalidSignature".into()))?;

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| JwtError::TokenDecode(format!("payload is not base64url: {e}")))?;
    serde_json::from_slice(&json)
        .map_err(|e| JwtError::TokenDecode(format!("payload is not a JSON object: {e}")))
}

fn encode_unsecured(claims: &ClaimSet) -> String {
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(UNSECURED_HEADER),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}
