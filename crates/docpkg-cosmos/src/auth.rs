//! Master-key request signing
//!
//! The signature is an HMAC-SHA256, keyed with the decoded account key, over
//! `verb\nresource type\nresource link\ndate\n\n` where verb, resource type
//! and date are lowercased.

use crate::error::CosmosError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Decoded account master key
#[derive(Clone)]
pub struct MasterKey {
    mac: HmacSha256,
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

impl MasterKey {
    /// Decode a base64 account key
    ///
    /// # Errors
    /// Returns [`CosmosError::InvalidKey`] if the key is not base64
    pub fn decode(key: &str) -> Result<Self, CosmosError> {
        let bytes = STANDARD.decode(key.trim())?;
        let mac = HmacSha256::new_from_slice(&bytes)
            .map_err(|e| CosmosError::InvalidConnectionString(e.to_string()))?;
        Ok(Self { mac })
    }

    /// URL-encoded `authorization` header value
    #[must_use]
    pub fn authorization(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        urlencoding::encode(&format!("type=master&ver=1.0&sig={signature}")).into_owned()
    }
}

/// RFC 1123 date as expected by `x-ms-date`
#[must_use]
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_format() {
        let date = Utc.with_ymd_and_hms(2017, 4, 27, 0, 51, 12).unwrap();
        assert_eq!(http_date(date), "Thu, 27 Apr 2017 00:51:12 GMT");
    }

    #[test]
    fn signature_is_deterministic_and_encoded() {
        let key = MasterKey::decode(&STANDARD.encode(b"secret-key")).unwrap();
        let a = key.authorization("GET", "docs", "dbs/db/colls/c/docs/1", "Thu, 27 Apr 2017 00:51:12 GMT");
        let b = key.authorization("get", "DOCS", "dbs/db/colls/c/docs/1", "thu, 27 apr 2017 00:51:12 gmt");
        assert_eq!(a, b);
        assert!(a.starts_with("type%3Dmaster%26ver%3D1.0%26sig%3D"));

        let other = key.authorization("GET", "docs", "dbs/db/colls/c/docs/2", "Thu, 27 Apr 2017 00:51:12 GMT");
        assert_ne!(a, other);
    }

    #[test]
    fn signature_matches_manual_hmac() {
        let raw = b"k".to_vec();
        let key = MasterKey::decode(&STANDARD.encode(&raw)).unwrap();
        let mut mac = HmacSha256::new_from_slice(&raw).unwrap();
        mac.update(b"post\ndocs\ndbs/d/colls/c\nmon, 01 jan 2024 00:00:00 gmt\n\n");
        let expected = format!(
            "type=master&ver=1.0&sig={}",
            STANDARD.encode(mac.finalize().into_bytes())
        );
        let header = key.authorization("POST", "docs", "dbs/d/colls/c", "Mon, 01 Jan 2024 00:00:00 GMT");
        assert_eq!(urlencoding::decode(&header).unwrap(), expected);
    }

    #[test]
    fn invalid_key_is_rejected() {
        assert!(matches!(MasterKey::decode("not base64!"), Err(CosmosError::InvalidKey(_))));
    }
}
