//! # Signed Object URLs
//!
//! Time-limited, capability-bearing links to a single object. The worker
//! issues them and serves them itself on [`OBJECTS_ROUTE`], so a link can be
//! opened in a new tab or fetched without a session cookie.
//!
//! ```text
//! /objects?key=alice%2Freport.pdf&expires=1700000300&signature=<hex hmac>
//! ```
//!
//! The signature is HMAC-SHA256 over `"{key}\n{expires}"`.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use worker::Url;

use crate::constants::OBJECTS_ROUTE;
use crate::errors::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedUrl {
    pub key: String,
    pub expires_at: DateTime<Utc>,
    pub signature: String,
}

impl SignedUrl {
    /// Absolute URL of the link relative to the worker's origin.
    pub fn to_url(&self, origin: &Url) -> AppResult<Url> {
        let mut url = origin
            .join(OBJECTS_ROUTE)
            .map_err(|e| AppError::BadRequest(format!("invalid origin: {}", e)))?;
        url.query_pairs_mut()
            .clear()
            .append_pair("key", &self.key)
            .append_pair("expires", &self.expires_at.timestamp().to_string())
            .append_pair("signature", &self.signature);
        Ok(url)
    }
}

#[derive(Clone)]
pub struct UrlSigner {
    key: Vec<u8>,
}

impl UrlSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Issues a link to `key` that stops working `ttl_secs` after `now`.
    pub fn sign(&self, key: &str, ttl_secs: i64, now: DateTime<Utc>) -> AppResult<SignedUrl> {
        let expires_at = now + Duration::seconds(ttl_secs);
        let mut mac = self.mac()?;
        mac.update(message(key, expires_at.timestamp()).as_bytes());
        Ok(SignedUrl {
            key: key.to_string(),
            expires_at,
            signature: hex::encode(mac.finalize().into_bytes()),
        })
    }

    /// Checks a link's signature and expiry and returns the object key.
    pub fn verify(&self, url: &Url, now: DateTime<Utc>) -> AppResult<String> {
        let mut key = None;
        let mut expires = None;
        let mut signature = None;
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "key" => key = Some(value.into_owned()),
                "expires" => expires = Some(value.into_owned()),
                "signature" => signature = Some(value.into_owned()),
                _ => {}
            }
        }

        let (Some(key), Some(expires), Some(signature)) = (key, expires, signature) else {
            return Err(AppError::Unauthorized("incomplete signed URL".to_string()));
        };
        let expires: i64 = expires
            .parse()
            .map_err(|_| AppError::Unauthorized("malformed expiry".to_string()))?;
        let signature = hex::decode(signature)
            .map_err(|_| AppError::Unauthorized("malformed signature".to_string()))?;

        let mut mac = self.mac()?;
        mac.update(message(&key, expires).as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AppError::Unauthorized("signature mismatch".to_string()))?;

        if now.timestamp() >= expires {
            return Err(AppError::Unauthorized("signed URL expired".to_string()));
        }
        Ok(key)
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|_| AppError::Config("unusable URL signing key".to_string()))
    }
}

fn message(key: &str, expires: i64) -> String {
    format!("{}\n{}", key, expires)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer() -> UrlSigner {
        UrlSigner::new(b"0123456789abcdef0123456789abcdef".to_vec())
    }

    fn origin() -> Url {
        Url::parse("https://vault.test/dashboard").unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn issued_link_verifies_until_expiry() {
        let signed = signer().sign("alice/report.pdf", 300, now()).unwrap();
        let url = signed.to_url(&origin()).unwrap();

        assert_eq!(url.path(), "/objects");
        assert_eq!(signer().verify(&url, now()).unwrap(), "alice/report.pdf");
        assert_eq!(
            signer()
                .verify(&url, now() + Duration::seconds(299))
                .unwrap(),
            "alice/report.pdf"
        );
        assert!(matches!(
            signer().verify(&url, now() + Duration::seconds(300)),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn tampered_key_is_rejected() {
        let signed = signer().sign("alice/report.pdf", 60, now()).unwrap();
        let forged = SignedUrl {
            key: "bob/report.pdf".to_string(),
            ..signed
        };
        let url = forged.to_url(&origin()).unwrap();
        assert!(matches!(
            signer().verify(&url, now()),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn link_from_another_key_is_rejected() {
        let signed = signer().sign("alice/a.txt", 60, now()).unwrap();
        let url = signed.to_url(&origin()).unwrap();
        let other = UrlSigner::new(b"ffffffffffffffffffffffffffffffff".to_vec());
        assert!(other.verify(&url, now()).is_err());
    }

    #[test]
    fn missing_parameters_are_rejected() {
        let url = Url::parse("https://vault.test/objects?key=alice%2Fa.txt").unwrap();
        assert!(matches!(
            signer().verify(&url, now()),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn keys_with_spaces_round_trip_through_the_query() {
        let signed = signer().sign("alice/my report & notes.pdf", 60, now()).unwrap();
        let url = signed.to_url(&origin()).unwrap();
        assert_eq!(
            signer().verify(&url, now()).unwrap(),
            "alice/my report & notes.pdf"
        );
    }
}
