//! Digest authentication against published and hand-computed vectors.
//!
//! These tests go through the public API only, the way the installer client
//! uses it: parse the server's challenge, let a [`DigestAuthenticator`] answer
//! it, and render the `Authorization` header.

use brs_core::protocol::digest::{ha1, ha2, md5_hex};
use brs_core::{
    Authorization, CnonceSource, DigestAuthenticator, DigestChallenge, DigestCredentials,
};

/// Returns the same client nonce every time so responses are reproducible.
struct FixedCnonce(&'static str);

impl CnonceSource for FixedCnonce {
    fn generate(&self) -> String {
        self.0.to_string()
    }
}

/// The worked example from RFC 2617 section 3.5.
#[test]
fn test_rfc2617_example_response() {
    // Arrange
    let challenge = DigestChallenge::parse(
        r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#,
    )
    .expect("RFC challenge parses");
    let creds = DigestCredentials {
        username: "Mufasa".into(),
        password: "Circle Of Life".into(),
    };

    // Act
    let auth = Authorization::compute(
        &creds,
        &challenge,
        "GET",
        "/dir/index.html",
        1,
        "0a4f113b".into(),
    );

    // Assert
    assert_eq!(auth.qop, "auth");
    assert_eq!(auth.response, "6629fae49393a05397450978507c4ef1");
    assert_eq!(auth.opaque, "5ccc069c403ebaf9f0171e9517f40e41");
}

#[test]
fn test_response_is_deterministic_for_fixed_inputs() {
    let challenge = DigestChallenge::parse(r#"Digest realm="rokudev", nonce="abc", qop="auth""#)
        .unwrap();
    let creds = DigestCredentials::developer("rokudev");

    let a = Authorization::compute(&creds, &challenge, "POST", "/plugin_install", 3, "c".into());
    let b = Authorization::compute(&creds, &challenge, "POST", "/plugin_install", 3, "c".into());

    assert_eq!(a, b);
}

#[test]
fn test_hash_chain_uses_colon_separators_in_order() {
    // Arrange
    let challenge = DigestChallenge {
        realm: "R".into(),
        nonce: "N".into(),
        qop: "auth".into(),
        opaque: String::new(),
    };
    let creds = DigestCredentials {
        username: "U".into(),
        password: "P".into(),
    };

    // Act
    let auth = Authorization::compute(&creds, &challenge, "M", "/u", 0x1f, "C".into());

    // Assert
    assert_eq!(ha1(&creds, "R"), md5_hex("U:R:P"));
    assert_eq!(ha2("M", "/u"), md5_hex("M:/u"));
    let expected = md5_hex(&format!(
        "{}:N:0000001f:C:auth:{}",
        md5_hex("U:R:P"),
        md5_hex("M:/u")
    ));
    assert_eq!(auth.response, expected);
}

#[test]
fn test_authenticator_nc_strictly_increases_across_challenges() {
    // Arrange: a fresh challenge per cycle, as the installer sees them
    let auth = DigestAuthenticator::with_cnonce_source(
        DigestCredentials::developer("pw"),
        Box::new(FixedCnonce("0a4f113b")),
    );

    // Act
    let ncs: Vec<String> = (0..5)
        .map(|i| {
            let challenge =
                DigestChallenge::parse(&format!(r#"Digest realm="rokudev", nonce="n{i}""#))
                    .unwrap();
            auth.authorize(&challenge, "POST", "/plugin_inspect").nc
        })
        .collect();

    // Assert
    assert_eq!(
        ncs,
        vec!["00000001", "00000002", "00000003", "00000004", "00000005"]
    );
}

#[test]
fn test_default_authenticator_draws_distinct_cnonces() {
    let auth = DigestAuthenticator::new(DigestCredentials::developer("pw"));
    let challenge = DigestChallenge::parse(r#"Digest nonce="n""#).unwrap();

    let first = auth.authorize(&challenge, "GET", "/");
    let second = auth.authorize(&challenge, "GET", "/");

    assert_ne!(first.cnonce, second.cnonce);
    assert_eq!(auth.username(), "rokudev");
}
