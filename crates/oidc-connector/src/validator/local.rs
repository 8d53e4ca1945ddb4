//! Local token validation against the provider's JWKS
//!
//! Faster than introspection because keys and metadata are cached, but a
//! token revoked at the provider stays valid here until it expires.
//!
//! ES512 is outside what `jsonwebtoken` implements; those tokens are checked
//! with `p521` directly.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use p521::ecdsa::{Signature as P521Signature, VerifyingKey as P521VerifyingKey};
use serde_json::Value;
use signature::Verifier as _;
use tracing::debug;

use super::TokenValidator;
use crate::claims::{ClaimSet, string_claim};
use crate::error::{TokenValidationError, ValidationResult};
use crate::provider::ProviderClient;

const P521_COORD_SIZE: usize = 66;

/// A signature algorithm the connector can verify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// Verified by `jsonwebtoken`
    Jws(Algorithm),
    /// ECDSA on P-521 with SHA-512
    Es512,
}

impl SigningAlgorithm {
    /// Parse a JOSE `alg` name
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "ES512" {
            return Some(Self::Es512);
        }
        Algorithm::from_str(name).ok().map(Self::Jws)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jws(alg) => write!(f, "{alg:?}"),
            Self::Es512 => f.write_str("ES512"),
        }
    }
}

/// Algorithms the connector can verify
pub const SUPPORTED_ALGORITHMS: &[SigningAlgorithm] = &[
    SigningAlgorithm::Jws(Algorithm::HS256),
    SigningAlgorithm::Jws(Algorithm::HS384),
    SigningAlgorithm::Jws(Algorithm::HS512),
    SigningAlgorithm::Jws(Algorithm::RS256),
    SigningAlgorithm::Jws(Algorithm::RS384),
    SigningAlgorithm::Jws(Algorithm::RS512),
    SigningAlgorithm::Jws(Algorithm::PS256),
    SigningAlgorithm::Jws(Algorithm::PS384),
    SigningAlgorithm::Jws(Algorithm::PS512),
    SigningAlgorithm::Jws(Algorithm::ES256),
    SigningAlgorithm::Jws(Algorithm::ES384),
    SigningAlgorithm::Es512,
    SigningAlgorithm::Jws(Algorithm::EdDSA),
];

/// Algorithm names rejected even when the provider advertises them
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none"];

/// Algorithms a token may be signed with
///
/// The provider's advertised introspection algorithms, restricted to
/// [`SUPPORTED_ALGORITHMS`] and with [`FORBIDDEN_ALGORITHMS`] removed.
/// Unknown names are ignored.
pub fn accepted_algorithms(advertised: &[String]) -> Vec<SigningAlgorithm> {
    let mut accepted = Vec::new();
    for name in advertised {
        if FORBIDDEN_ALGORITHMS
            .iter()
            .any(|forbidden| forbidden.eq_ignore_ascii_case(name))
        {
            continue;
        }
        let Some(alg) = SigningAlgorithm::from_name(name) else {
            continue;
        };
        if SUPPORTED_ALGORITHMS.contains(&alg) && !accepted.contains(&alg) {
            accepted.push(alg);
        }
    }
    accepted
}

/// The three segments of a compact JWS
struct CompactToken<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> CompactToken<'a> {
    fn split(token: &'a str) -> ValidationResult<Self> {
        let mut parts = token.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(payload), Some(signature), None) => Ok(Self {
                header,
                payload,
                signature,
            }),
            _ => Err(invalid_token("expected three segments")),
        }
    }

    fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }
}

fn invalid_token(reason: impl fmt::Display) -> TokenValidationError {
    TokenValidationError::Verification(format!("invalid token: {reason}"))
}

fn base64_url_decode(segment: &str) -> Result<Vec<u8>, String> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| format!("base64url decode error: {e}"))
}

/// `alg` and `kid` read straight from the header
///
/// `jsonwebtoken::Header` only knows its own algorithms, so the header is
/// parsed as plain JSON first.
fn read_header(segment: &str) -> ValidationResult<(String, Option<String>)> {
    let bytes = base64_url_decode(segment).map_err(invalid_token)?;
    let header: Value = serde_json::from_slice(&bytes).map_err(invalid_token)?;

    let alg = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_token("missing alg"))?;
    let kid = header.get("kid").and_then(Value::as_str).map(str::to_string);

    Ok((alg.to_string(), kid))
}

fn p521_coordinate(value: &str) -> Result<Vec<u8>, String> {
    let bytes = base64_url_decode(value)?;
    if bytes.len() > P521_COORD_SIZE {
        return Err("P-521 coordinate too long".to_string());
    }
    let mut padded = vec![0u8; P521_COORD_SIZE - bytes.len()];
    padded.extend_from_slice(&bytes);
    Ok(padded)
}

fn p521_verifying_key(jwk: &Jwk) -> Result<P521VerifyingKey, String> {
    let AlgorithmParameters::EllipticCurve(params) = &jwk.algorithm else {
        return Err("ES512 requires an EC key".to_string());
    };
    if params.curve != EllipticCurve::P521 {
        return Err("ES512 requires a P-521 key".to_string());
    }

    let mut sec1 = Vec::with_capacity(1 + 2 * P521_COORD_SIZE);
    sec1.push(0x04);
    sec1.extend_from_slice(&p521_coordinate(&params.x)?);
    sec1.extend_from_slice(&p521_coordinate(&params.y)?);

    P521VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| "invalid P-521 key".to_string())
}

fn verify_es512(token: &CompactToken<'_>, jwk: &Jwk) -> Result<ClaimSet, String> {
    let key = p521_verifying_key(jwk)?;
    let signature = P521Signature::from_slice(&base64_url_decode(token.signature)?)
        .map_err(|_| "InvalidSignature".to_string())?;
    key.verify(token.signing_input().as_bytes(), &signature)
        .map_err(|_| "InvalidSignature".to_string())?;

    let payload = base64_url_decode(token.payload)?;
    serde_json::from_slice(&payload).map_err(|e| format!("JSON error: {e}"))
}

fn verify_jws(raw: &str, alg: Algorithm, jwk: &Jwk) -> Result<ClaimSet, String> {
    // Registered claims are checked separately against an explicit clock
    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation.leeway = 0;

    let key = DecodingKey::from_jwk(jwk).map_err(|e| {
        debug!(kid = ?jwk.common.key_id, error = %e, "Unusable JWK");
        e.to_string()
    })?;
    decode::<ClaimSet>(raw, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| e.to_string())
}

/// Verify the signature of a compact JWS and return its payload
///
/// Keys are selected by the header `kid`; every key is tried when the header
/// has none.
///
/// # Errors
///
/// Returns [`TokenValidationError::Verification`] if the token cannot be
/// parsed, its algorithm is not accepted, no key matches, or no candidate key
/// verifies the signature
pub fn verify_signature(
    token: &str,
    jwks: &JwkSet,
    accepted: &[SigningAlgorithm],
) -> ValidationResult<ClaimSet> {
    let compact = CompactToken::split(token)?;
    let (alg_name, kid) = read_header(compact.header)?;

    let alg = SigningAlgorithm::from_name(&alg_name).ok_or_else(|| {
        TokenValidationError::Verification(format!("unsupported algorithm '{alg_name}'"))
    })?;
    if !accepted.contains(&alg) {
        return Err(TokenValidationError::Verification(format!(
            "algorithm {alg} is not allowed"
        )));
    }

    let candidates = jwks.keys.iter().filter(|jwk| match &kid {
        Some(kid) => jwk.common.key_id.as_deref() == Some(kid.as_str()),
        None => true,
    });

    let mut last_error = None;
    for jwk in candidates {
        let verified = match alg {
            SigningAlgorithm::Jws(alg) => verify_jws(token, alg, jwk),
            SigningAlgorithm::Es512 => verify_es512(&compact, jwk),
        };
        match verified {
            Ok(claims) => {
                debug!(algorithm = %alg, kid = ?jwk.common.key_id, "Token signature verified");
                return Ok(claims);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(TokenValidationError::Verification(last_error.unwrap_or_else(
        || match &kid {
            Some(kid) => format!("no key with kid '{kid}'"),
            None => "no keys available".to_string(),
        },
    )))
}

fn time_claim(claims: &ClaimSet, name: &str) -> ValidationResult<Option<i64>> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| {
                TokenValidationError::Claims(format!("The claim \"{name}\" must be an integer."))
            }),
        Some(_) => Err(TokenValidationError::Claims(format!(
            "The claim \"{name}\" must be an integer."
        ))),
    }
}

/// Check the registered time claims and the issuer
///
/// `now` is seconds since the epoch. Absent time claims are not checked; the
/// issuer must be present and equal `issuer` exactly.
///
/// # Errors
///
/// Returns [`TokenValidationError::Claims`] naming the first failed check
pub fn check_claims(claims: &ClaimSet, issuer: &str, leeway: u64, now: i64) -> ValidationResult<()> {
    let leeway = i64::try_from(leeway).unwrap_or(i64::MAX);

    if let Some(iat) = time_claim(claims, "iat")?
        && iat > now.saturating_add(leeway)
    {
        return Err(TokenValidationError::Claims(
            "The token was issued in the future.".to_string(),
        ));
    }

    if let Some(nbf) = time_claim(claims, "nbf")?
        && nbf > now.saturating_add(leeway)
    {
        return Err(TokenValidationError::Claims(
            "The token cannot be used yet.".to_string(),
        ));
    }

    if let Some(exp) = time_claim(claims, "exp")?
        && exp < now.saturating_sub(leeway)
    {
        return Err(TokenValidationError::Claims("The token expired.".to_string()));
    }

    if string_claim(claims, "iss") != Some(issuer) {
        return Err(TokenValidationError::Claims("Unknown issuer.".to_string()));
    }

    Ok(())
}

/// Shape a locally validated payload like an introspection response
///
/// Copies `preferred_username` to `username` (or sets `username` to null),
/// copies `azp` to `client_id` and marks the token active.
pub fn normalize_claims(mut claims: ClaimSet) -> ClaimSet {
    if let Some(preferred) = claims.get("preferred_username").filter(|v| !v.is_null()).cloned() {
        claims.insert("username".to_string(), preferred);
    }
    if claims.get("username").is_none_or(Value::is_null) {
        claims.insert("username".to_string(), Value::Null);
    }
    if let Some(azp) = claims.get("azp").filter(|v| !v.is_null()).cloned() {
        claims.insert("client_id".to_string(), azp);
    }
    claims.insert("active".to_string(), Value::Bool(true));
    claims
}

/// Validates tokens with the provider's public keys
#[derive(Debug, Clone)]
pub struct LocalValidator {
    provider: Arc<ProviderClient>,
    leeway: u64,
}

impl LocalValidator {
    /// Create a validator with a clock leeway in seconds
    pub fn new(provider: Arc<ProviderClient>, leeway: u64) -> Self {
        Self { provider, leeway }
    }

    /// Clock leeway in seconds
    pub fn leeway(&self) -> u64 {
        self.leeway
    }
}

#[async_trait]
impl TokenValidator for LocalValidator {
    async fn validate(&self, token: &str) -> ValidationResult<ClaimSet> {
        let jwks = self.provider.jwks().await?;
        let metadata = self.provider.provider_config().await?;

        let accepted = accepted_algorithms(metadata.introspection_signing_algorithms());
        let claims = verify_signature(token, &jwks, &accepted)?;

        check_claims(
            &claims,
            &metadata.issuer,
            self.leeway,
            chrono::Utc::now().timestamp(),
        )?;

        Ok(normalize_claims(claims))
    }
}
