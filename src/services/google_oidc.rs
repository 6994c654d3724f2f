// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google ID token verification for client sign-in.

use crate::config::Config;
use crate::time_utils::now_unix_secs;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const DEFAULT_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;
/// Minimum spacing between refreshes triggered by an unknown `kid`.
const MIN_UNKNOWN_KID_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Issuers Google uses for ID tokens.
pub const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

/// Identity extracted from a valid Google ID token.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Stable Google account identifier (`sub`)
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// OIDC verification error categories.
#[derive(Debug, Clone)]
pub enum OidcError {
    /// The token is malformed, unsigned by a known key, or its claims do not match.
    Rejected(String),
    /// Google's key endpoints could not be reached or returned garbage.
    Transient(String),
}

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct DiscoveryCacheEntry {
    jwks_uri: String,
    expires_at: Instant,
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Google-issued OIDC ID tokens presented by sign-in clients.
pub struct GoogleIdTokenVerifier {
    http_client: reqwest::Client,
    expected_audiences: Vec<String>,
    mode: VerifierMode,
    discovery_url: String,
    fallback_jwks_url: String,
    discovery_cache: RwLock<Option<DiscoveryCacheEntry>>,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    /// Serializes JWKS fetches; holds the time of the last unknown-`kid` refresh.
    refresh_lock: Mutex<Option<Instant>>,
}

impl GoogleIdTokenVerifier {
    /// Create a production verifier that discovers and caches Google JWKS keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let verifier = Self::new_with_endpoints(config, DISCOVERY_URL, DEFAULT_JWKS_URL)?;

        tracing::info!(
            expected_audiences = ?verifier.expected_audiences,
            "Initialized Google ID token verifier"
        );

        Ok(verifier)
    }

    /// Create a JWKS-backed verifier against the given discovery document and
    /// fallback JWKS URL.
    pub fn new_with_endpoints(
        config: &Config,
        discovery_url: impl Into<String>,
        fallback_jwks_url: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let mut verifier = Self::with_mode(config, VerifierMode::Google)?;
        verifier.discovery_url = discovery_url.into();
        verifier.fallback_jwks_url = fallback_jwks_url.into();
        Ok(verifier)
    }

    /// Create a verifier with a static RSA public key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static OIDC kid must not be empty");
        }

        Self::with_mode(
            config,
            VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
        )
    }

    fn with_mode(config: &Config, mode: VerifierMode) -> anyhow::Result<Self> {
        if config.google_client_ids.is_empty() {
            anyhow::bail!("at least one Google client ID is required");
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building OIDC HTTP client")?;

        Ok(Self {
            http_client,
            expected_audiences: config.google_client_ids.clone(),
            mode,
            discovery_url: DISCOVERY_URL.to_string(),
            fallback_jwks_url: DEFAULT_JWKS_URL.to_string(),
            discovery_cache: RwLock::new(None),
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(None),
        })
    }

    /// Verify a raw ID token and return the identity it asserts.
    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, OidcError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(OidcError::Rejected("ID token is empty".to_string()));
        }

        let header = decode_header(token)
            .map_err(|e| OidcError::Rejected(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(OidcError::Rejected(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| OidcError::Rejected("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(self.expected_audiences.as_slice());
        validation.validate_nbf = true;
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<GoogleIdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| OidcError::Rejected(format!("JWT validation failed: {e}")))?;

        let claims = token_data.claims;

        tracing::debug!(
            subject = %claims.sub,
            email_verified = ?claims.email_verified,
            issuer = %claims.iss,
            exp = claims.exp,
            "Google ID token claims"
        );

        validate_iat(claims.iat)?;

        Ok(VerifiedIdentity {
            subject: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified.unwrap_or(false),
            name: claims.name,
            picture: claims.picture,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, OidcError> {
        match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                return Err(OidcError::Rejected(format!(
                    "unknown JWT kid for static verifier: {kid}"
                )));
            }
            VerifierMode::Google => {}
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        self.refresh_jwks(kid).await?.ok_or_else(|| {
            OidcError::Rejected(format!("JWT kid not found in JWKS: {kid}"))
        })
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    /// Fetch the JWKS unless a concurrent caller already did, and return the
    /// key for `kid` if the key set has it.
    ///
    /// At most one fetch is in flight. A fetch for a `kid` missing from a
    /// still-fresh key set happens at most once per
    /// `MIN_UNKNOWN_KID_REFRESH_INTERVAL`.
    async fn refresh_jwks(&self, kid: &str) -> Result<Option<Arc<DecodingKey>>, OidcError> {
        let mut last_unknown_kid_refresh = self.refresh_lock.lock().await;

        {
            let cache = self.jwks_cache.read().await;
            if let Some(entry) = cache
                .as_ref()
                .filter(|entry| entry.expires_at > Instant::now())
            {
                if let Some(key) = entry.keys_by_kid.get(kid) {
                    return Ok(Some(key.clone()));
                }

                if last_unknown_kid_refresh
                    .is_some_and(|at| at.elapsed() < MIN_UNKNOWN_KID_REFRESH_INTERVAL)
                {
                    tracing::debug!(kid, "Skipping JWKS refresh for unknown kid");
                    return Ok(None);
                }
                *last_unknown_kid_refresh = Some(Instant::now());
            }
        }

        let jwks_uri = self.resolve_jwks_uri().await?;

        tracing::debug!(jwks_uri = %jwks_uri, "Refreshing Google JWKS cache");

        let response = self
            .http_client
            .get(&jwks_uri)
            .send()
            .await
            .map_err(|e| OidcError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(OidcError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| OidcError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_rsa_keys(jwks);
        if keys_by_kid.is_empty() {
            return Err(OidcError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let key = keys_by_kid.get(kid).cloned();

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Google JWKS cache refreshed");
        Ok(key)
    }

    /// Find the JWKS URI from the discovery document, falling back to the
    /// last known or well-known URI if discovery fails.
    async fn resolve_jwks_uri(&self) -> Result<String, OidcError> {
        let cached_jwks_uri = {
            let cache = self.discovery_cache.read().await;
            match cache.as_ref() {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(entry.jwks_uri.clone());
                }
                Some(entry) => Some(entry.jwks_uri.clone()),
                None => None,
            }
        };

        match self.http_client.get(&self.discovery_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let ttl = cache_ttl_from_headers(resp.headers(), DEFAULT_CACHE_TTL);
                let discovery: OpenIdConfig = resp
                    .json()
                    .await
                    .map_err(|e| OidcError::Transient(format!("invalid discovery JSON: {e}")))?;

                *self.discovery_cache.write().await = Some(DiscoveryCacheEntry {
                    jwks_uri: discovery.jwks_uri.clone(),
                    expires_at: Instant::now() + ttl,
                });

                Ok(discovery.jwks_uri)
            }
            Ok(resp) => {
                tracing::warn!(
                    status = %resp.status(),
                    "OIDC discovery returned non-success status; using fallback JWKS URI"
                );
                Ok(cached_jwks_uri.unwrap_or_else(|| self.fallback_jwks_url.clone()))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "OIDC discovery request failed; using fallback JWKS URI"
                );
                Ok(cached_jwks_uri.unwrap_or_else(|| self.fallback_jwks_url.clone()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    iss: String,
    sub: String,
    exp: usize,
    iat: Option<usize>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

/// Keep RS256 signing keys, indexed by `kid`.
fn usable_rsa_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }

        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }

        if jwk.use_.as_deref().is_some_and(|use_| use_ != "sig") {
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

fn validate_iat(iat: Option<usize>) -> Result<(), OidcError> {
    let now = now_unix_secs();

    let Some(iat) = iat else {
        return Err(OidcError::Rejected("missing iat claim".to_string()));
    };

    if iat as u64 > now + CLOCK_SKEW_SECS {
        return Err(OidcError::Rejected("iat claim is in the future".to_string()));
    }

    Ok(())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|raw| raw.trim_matches('"').parse::<u64>().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=19845, must-revalidate, no-transform"),
            Some(19845)
        );
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn cache_ttl_falls_back_without_header() {
        let headers = reqwest::header::HeaderMap::new();
        assert_eq!(
            cache_ttl_from_headers(&headers, DEFAULT_CACHE_TTL),
            DEFAULT_CACHE_TTL
        );
    }

    #[test]
    fn validate_iat_rules() {
        let now = now_unix_secs() as usize;
        assert!(validate_iat(Some(now)).is_ok());
        assert!(validate_iat(Some(now + 30)).is_ok());
        assert!(matches!(
            validate_iat(Some(now + 3600)),
            Err(OidcError::Rejected(_))
        ));
        assert!(matches!(validate_iat(None), Err(OidcError::Rejected(_))));
    }

    #[test]
    fn usable_rsa_keys_filters_non_signing_keys() {
        let jwks: Jwks = serde_json::from_value(serde_json::json!({
            "keys": [
                { "kid": "ec", "kty": "EC", "n": "", "e": "" },
                { "kid": "enc", "kty": "RSA", "use": "enc", "n": "AQAB", "e": "AQAB" },
                { "kid": "ps", "kty": "RSA", "alg": "PS256", "n": "AQAB", "e": "AQAB" },
                { "kid": " ", "kty": "RSA", "n": "AQAB", "e": "AQAB" },
                { "kid": "good", "kty": "RSA", "alg": "RS256", "use": "sig", "n": "AQAB", "e": "AQAB" }
            ]
        }))
        .unwrap();

        let keys = usable_rsa_keys(jwks);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("good"));
    }

    #[tokio::test]
    async fn verify_rejects_garbage_tokens() {
        let verifier = GoogleIdTokenVerifier::new_with_static_key(
            &Config::test_default(),
            "kid",
            DecodingKey::from_secret(b"unused"),
        )
        .unwrap();

        assert!(matches!(
            verifier.verify("").await,
            Err(OidcError::Rejected(_))
        ));
        assert!(matches!(
            verifier.verify("not-a-jwt").await,
            Err(OidcError::Rejected(_))
        ));
    }

    #[test]
    fn static_verifier_requires_kid() {
        let result = GoogleIdTokenVerifier::new_with_static_key(
            &Config::test_default(),
            "  ",
            DecodingKey::from_secret(b"unused"),
        );
        assert!(result.is_err());
    }
}
