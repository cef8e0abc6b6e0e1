use chrono::{DateTime, Utc};
use dci_common::Credentials;
use reqwest::header::{HeaderMap, HeaderValue};
use ring::{digest, hmac};

use crate::error::{ClientError, ClientResult};

pub const DATETIME_HEADER: &str = "dci-datetime";
pub const CLIENT_INFO_HEADER: &str = "dci-client-info";
pub const SIGNATURE_HEADER: &str = "dci-auth-signature";

const CONTENT_TYPE: &str = "application/json";

/// Signs requests with the client's API secret (HMAC-SHA256).
///
/// The credentials are opaque to the rest of the client: only the signer
/// reads them.
#[derive(Clone)]
pub struct Signer {
    client_id: String,
    key: hmac::Key,
}

impl Signer {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            key: hmac::Key::new(hmac::HMAC_SHA256, credentials.api_secret.as_bytes()),
        }
    }

    /// Headers authenticating a GET of `url` at instant `now`
    pub fn headers(&self, url: &reqwest::Url, now: DateTime<Utc>) -> ClientResult<HeaderMap> {
        let timestamp = now.format("%Y-%m-%d %H:%M:%SZ").to_string();
        let signature = self.signature("GET", url, &timestamp, b"");

        let mut headers = HeaderMap::new();
        headers.insert(DATETIME_HEADER, header_value(&timestamp)?);
        headers.insert(
            CLIENT_INFO_HEADER,
            header_value(&format!("{}/{}", timestamp, self.client_id))?,
        );
        headers.insert(SIGNATURE_HEADER, header_value(&signature)?);
        Ok(headers)
    }

    fn signature(&self, method: &str, url: &reqwest::Url, timestamp: &str, payload: &[u8]) -> String {
        let payload_hash = hex::encode(digest::digest(&digest::SHA256, payload));
        let string_to_sign = [
            method,
            CONTENT_TYPE,
            timestamp,
            url.path(),
            url.query().unwrap_or(""),
            payload_hash.as_str(),
        ]
        .join("\n");
        hex::encode(hmac::sign(&self.key, string_to_sign.as_bytes()))
    }
}

fn header_value(value: &str) -> ClientResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ClientError::InvalidUrl(e.to_string()))
}
