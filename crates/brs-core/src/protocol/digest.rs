//! HTTP Digest authentication (RFC 2617, `qop=auth` subset).
//!
//! The web installer answers an unauthenticated request with `401` and a
//! `WWW-Authenticate: Digest ...` challenge.  The client proves it knows the
//! password without sending it by hashing it together with values picked by
//! both sides:
//!
//! ```text
//! HA1      = MD5(username:realm:password)
//! HA2      = MD5(method:uri)
//! response = MD5(HA1:nonce:nc:cnonce:qop:HA2)
//! ```
//!
//! - `nonce` is chosen by the server and comes from the challenge.
//! - `nc` (nonce count) is a per-client counter, rendered as 8 lowercase hex
//!   digits.  The server rejects a repeated value as a replay, so it must
//!   increase with every authenticated attempt.
//! - `cnonce` is a fresh random value chosen by the client for each attempt.
//!
//! MD5 is mandated by the installer's Digest implementation; it is a
//! protocol-compatibility requirement, not a security choice.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use md5::{Digest, Md5};
use rand::RngCore;
use regex::Regex;
use thiserror::Error;

/// Account name of the simulator's developer web installer.
pub const DEV_USERNAME: &str = "rokudev";

/// Quality-of-protection value used when the challenge does not name one.
const DEFAULT_QOP: &str = "auth";

/// Errors raised while interpreting a Digest challenge.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestError {
    /// The server answered 401 without any challenge header.
    #[error("no WWW-Authenticate header in 401 response")]
    MissingHeader,

    /// The challenge uses a scheme other than Digest (e.g. Basic).
    #[error("unsupported authentication scheme: {0}")]
    UnsupportedScheme(String),

    /// A field required to compute the response is absent or empty.
    #[error("digest challenge has no {0}")]
    MissingField(&'static str),
}

// ── Challenge ─────────────────────────────────────────────────────────────────

/// The server-chosen values from one `WWW-Authenticate: Digest` header.
///
/// A challenge is only valid for the request cycle that produced it and is
/// never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: String,
    pub opaque: String,
}

impl DigestChallenge {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// Attribute values may be quoted or bare.  `realm` and `opaque` default
    /// to the empty string, `qop` defaults to `auth`, and when the server
    /// offers a list such as `auth,auth-int` the `auth` option is chosen.
    ///
    /// # Errors
    ///
    /// - [`DigestError::UnsupportedScheme`] if the scheme is not `Digest`.
    /// - [`DigestError::MissingField`] if there is no non-empty `nonce`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use brs_core::DigestChallenge;
    ///
    /// let c = DigestChallenge::parse(r#"Digest realm="rokudev", nonce="abc", qop="auth""#).unwrap();
    /// assert_eq!(c.realm, "rokudev");
    /// assert_eq!(c.nonce, "abc");
    /// assert_eq!(c.opaque, "");
    /// ```
    pub fn parse(header: &str) -> Result<Self, DigestError> {
        let trimmed = header.trim();
        let (scheme, params) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        if !scheme.eq_ignore_ascii_case("digest") {
            return Err(DigestError::UnsupportedScheme(scheme.to_string()));
        }

        let mut attrs = parse_params(params);
        let nonce = attrs
            .remove("nonce")
            .filter(|n| !n.is_empty())
            .ok_or(DigestError::MissingField("nonce"))?;

        Ok(Self {
            realm: attrs.remove("realm").unwrap_or_default(),
            nonce,
            qop: select_qop(attrs.get("qop").map(String::as_str)),
            opaque: attrs.remove("opaque").unwrap_or_default(),
        })
    }
}

/// Matches `key="quoted value"` or `key=bare`.
fn param_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([A-Za-z][A-Za-z0-9_-]*)\s*=\s*(?:"([^"]*)"|([^\s,"]+))"#)
            .expect("digest parameter pattern is a valid regex")
    })
}

/// Collects the challenge attributes, keyed by lowercase name.
fn parse_params(params: &str) -> HashMap<String, String> {
    param_pattern()
        .captures_iter(params)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
            Some((key, value))
        })
        .collect()
}

fn select_qop(offered: Option<&str>) -> String {
    let Some(offered) = offered else {
        return DEFAULT_QOP.to_string();
    };
    let options: Vec<&str> = offered
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .collect();
    if options.is_empty() || options.contains(&DEFAULT_QOP) {
        DEFAULT_QOP.to_string()
    } else {
        options[0].to_string()
    }
}

// ── Nonce count ───────────────────────────────────────────────────────────────

/// Per-client nonce count (`nc`).
///
/// Starts at 0; the first call to [`next`](Self::next) returns 1.  Each
/// authenticated attempt must take exactly one value so the server never
/// sees the same `nc` twice for a client.
#[derive(Debug, Default)]
pub struct NonceCounter {
    inner: AtomicU32,
}

impl NonceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter and returns the new value.
    pub fn next(&self) -> u32 {
        self.inner.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Returns the most recently issued value (0 before any attempt).
    pub fn current(&self) -> u32 {
        self.inner.load(Ordering::Relaxed)
    }

    /// Renders a count the way the `nc` directive requires: 8 lowercase hex digits.
    pub fn format(nc: u32) -> String {
        format!("{nc:08x}")
    }
}

// ── Client nonce ──────────────────────────────────────────────────────────────

/// Source of client nonces (`cnonce`).
///
/// The installer uses [`RandomCnonce`]; tests inject a fixed value to make the
/// response hash reproducible.
pub trait CnonceSource: Send + Sync {
    /// Returns a fresh client nonce for one authentication attempt.
    fn generate(&self) -> String;
}

/// 16 random bytes, hex-encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCnonce;

impl CnonceSource for RandomCnonce {
    fn generate(&self) -> String {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

// ── Response computation ──────────────────────────────────────────────────────

/// Username and password presented to the installer.
#[derive(Clone, PartialEq, Eq)]
pub struct DigestCredentials {
    pub username: String,
    pub password: String,
}

impl DigestCredentials {
    /// Credentials for the developer account with the given password.
    pub fn developer(password: impl Into<String>) -> Self {
        Self {
            username: DEV_USERNAME.to_string(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for DigestCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Lowercase hex MD5 of a UTF-8 string.
pub fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// `HA1 = MD5(username:realm:password)`
pub fn ha1(credentials: &DigestCredentials, realm: &str) -> String {
    md5_hex(&format!(
        "{}:{}:{}",
        credentials.username, realm, credentials.password
    ))
}

/// `HA2 = MD5(method:uri)`
pub fn ha2(method: &str, uri: &str) -> String {
    md5_hex(&format!("{method}:{uri}"))
}

/// The nine directives of an `Authorization: Digest` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub qop: String,
    pub nc: String,
    pub cnonce: String,
    pub response: String,
    pub opaque: String,
}

impl Authorization {
    /// Computes the response for one request.
    ///
    /// Deterministic: the same inputs always give the same `response`.
    pub fn compute(
        credentials: &DigestCredentials,
        challenge: &DigestChallenge,
        method: &str,
        uri: &str,
        nc: u32,
        cnonce: String,
    ) -> Self {
        let nc = NonceCounter::format(nc);
        let ha1 = ha1(credentials, &challenge.realm);
        let ha2 = ha2(method, uri);
        let response = md5_hex(&format!(
            "{ha1}:{}:{nc}:{cnonce}:{}:{ha2}",
            challenge.nonce, challenge.qop
        ));

        Self {
            username: credentials.username.clone(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            uri: uri.to_string(),
            qop: challenge.qop.clone(),
            nc,
            cnonce,
            response,
            opaque: challenge.opaque.clone(),
        }
    }
}

impl fmt::Display for Authorization {
    /// Renders the header value.  `qop` and `nc` are tokens and stay unquoted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", qop={}, nc={}, cnonce=\"{}\", response=\"{}\", opaque=\"{}\"",
            self.username,
            self.realm,
            self.nonce,
            self.uri,
            self.qop,
            self.nc,
            self.cnonce,
            self.response,
            self.opaque
        )
    }
}

// ── Authenticator ─────────────────────────────────────────────────────────────

/// Answers challenges on behalf of one client.
///
/// Owns the client's nonce counter and cnonce source so that neither can be
/// advanced from outside.  Every call to [`authorize`](Self::authorize)
/// consumes exactly one `nc` value.
pub struct DigestAuthenticator {
    credentials: DigestCredentials,
    counter: NonceCounter,
    cnonce: Box<dyn CnonceSource>,
}

impl DigestAuthenticator {
    /// Creates an authenticator that draws random client nonces.
    pub fn new(credentials: DigestCredentials) -> Self {
        Self::with_cnonce_source(credentials, Box::new(RandomCnonce))
    }

    /// Creates an authenticator with an injected client-nonce source.
    pub fn with_cnonce_source(
        credentials: DigestCredentials,
        cnonce: Box<dyn CnonceSource>,
    ) -> Self {
        Self {
            credentials,
            counter: NonceCounter::new(),
            cnonce,
        }
    }

    /// Builds the `Authorization` for one attempt at `method uri`.
    pub fn authorize(&self, challenge: &DigestChallenge, method: &str, uri: &str) -> Authorization {
        let nc = self.counter.next();
        Authorization::compute(
            &self.credentials,
            challenge,
            method,
            uri,
            nc,
            self.cnonce.generate(),
        )
    }

    /// The last `nc` issued (0 before the first attempt).
    pub fn nonce_count(&self) -> u32 {
        self.counter.current()
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }
}

impl fmt::Debug for DigestAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestAuthenticator")
            .field("credentials", &self.credentials)
            .field("nc", &self.counter.current())
            .finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCnonce(&'static str);

    impl CnonceSource for FixedCnonce {
        fn generate(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_parse_full_challenge() {
        // Arrange
        let header =
            r#"Digest realm="rokudev", nonce="abc123", qop="auth", opaque="xyz", algorithm=MD5"#;

        // Act
        let c = DigestChallenge::parse(header).unwrap();

        // Assert
        assert_eq!(c.realm, "rokudev");
        assert_eq!(c.nonce, "abc123");
        assert_eq!(c.qop, "auth");
        assert_eq!(c.opaque, "xyz");
    }

    #[test]
    fn test_parse_missing_qop_defaults_to_auth() {
        let c = DigestChallenge::parse(r#"Digest realm="r", nonce="n""#).unwrap();
        assert_eq!(c.qop, "auth");
    }

    #[test]
    fn test_parse_qop_list_prefers_auth() {
        let c = DigestChallenge::parse(r#"Digest realm="r", nonce="n", qop="auth-int,auth""#)
            .unwrap();
        assert_eq!(c.qop, "auth");
    }

    #[test]
    fn test_parse_accepts_bare_values_and_any_case() {
        // Arrange: unquoted qop and a mixed-case scheme / attribute name
        let header = "digest Realm=\"r\", nonce=\"n\", qop=auth";

        // Act
        let c = DigestChallenge::parse(header).unwrap();

        // Assert
        assert_eq!(c.realm, "r");
        assert_eq!(c.qop, "auth");
    }

    #[test]
    fn test_parse_missing_opaque_is_empty() {
        let c = DigestChallenge::parse(r#"Digest nonce="n""#).unwrap();
        assert_eq!(c.opaque, "");
        assert_eq!(c.realm, "");
    }

    #[test]
    fn test_parse_rejects_basic_scheme() {
        let result = DigestChallenge::parse(r#"Basic realm="r""#);
        assert_eq!(result, Err(DigestError::UnsupportedScheme("Basic".into())));
    }

    #[test]
    fn test_parse_rejects_challenge_without_nonce() {
        let result = DigestChallenge::parse(r#"Digest realm="r""#);
        assert_eq!(result, Err(DigestError::MissingField("nonce")));
    }

    #[test]
    fn test_nonce_counter_starts_at_one_and_increments() {
        // Arrange
        let counter = NonceCounter::new();

        // Act / Assert
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn test_nonce_count_format_is_eight_hex_digits() {
        assert_eq!(NonceCounter::format(1), "00000001");
        assert_eq!(NonceCounter::format(255), "000000ff");
        assert_eq!(NonceCounter::format(0xdead_beef), "deadbeef");
    }

    #[test]
    fn test_random_cnonce_is_32_hex_chars_and_varies() {
        let a = RandomCnonce.generate();
        let b = RandomCnonce.generate();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b, "two draws of 128 random bits must differ");
    }

    #[test]
    fn test_md5_hex_known_value() {
        // RFC 1321 test suite
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_response_matches_manual_hash_chain() {
        // Arrange
        let creds = DigestCredentials::developer("secret");
        let challenge = DigestChallenge {
            realm: "rokudev".into(),
            nonce: "abc".into(),
            qop: "auth".into(),
            opaque: "op".into(),
        };

        // Act
        let auth =
            Authorization::compute(&creds, &challenge, "POST", "/plugin_install", 1, "cn".into());

        // Assert: rebuild the chain by hand
        let ha1 = md5_hex("rokudev:rokudev:secret");
        let ha2 = md5_hex("POST:/plugin_install");
        let expected = md5_hex(&format!("{ha1}:abc:00000001:cn:auth:{ha2}"));
        assert_eq!(auth.response, expected);
        assert_eq!(auth.nc, "00000001");
    }

    #[test]
    fn test_authorization_header_lists_all_nine_directives() {
        // Arrange
        let creds = DigestCredentials::developer("pw");
        let challenge = DigestChallenge::parse(r#"Digest realm="r", nonce="n", opaque="o""#)
            .unwrap();

        // Act
        let header =
            Authorization::compute(&creds, &challenge, "GET", "/", 7, "c".into()).to_string();

        // Assert
        assert!(header.starts_with("Digest username=\"rokudev\""));
        for directive in [
            "realm=\"r\"",
            "nonce=\"n\"",
            "uri=\"/\"",
            "qop=auth",
            "nc=00000007",
            "cnonce=\"c\"",
            "response=\"",
            "opaque=\"o\"",
        ] {
            assert!(header.contains(directive), "missing {directive} in {header}");
        }
    }

    #[test]
    fn test_authenticator_consumes_one_nc_per_attempt() {
        // Arrange
        let auth = DigestAuthenticator::with_cnonce_source(
            DigestCredentials::developer("pw"),
            Box::new(FixedCnonce("fixed")),
        );
        let challenge = DigestChallenge::parse(r#"Digest nonce="n""#).unwrap();

        // Act
        let first = auth.authorize(&challenge, "POST", "/a");
        let second = auth.authorize(&challenge, "POST", "/a");

        // Assert
        assert_eq!(first.nc, "00000001");
        assert_eq!(second.nc, "00000002");
        assert_eq!(first.cnonce, "fixed");
        assert_ne!(first.response, second.response, "nc is part of the hash");
        assert_eq!(auth.nonce_count(), 2);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = DigestCredentials::developer("hunter2");
        let shown = format!("{creds:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("rokudev"));
    }
}
