//! Presigned POST policies for direct browser uploads.
//!
//! The AWS SDK only presigns GET/PUT requests, so the POST policy document
//! is assembled and signed here with the SigV4 key-derivation chain.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::client::ObjectStore;
use crate::error::{StorageError, StorageResult};

type HmacSha256 = Hmac<Sha256>;

/// Fields a client must include in its multipart POST upload form.
#[derive(Debug, Clone, Serialize)]
pub struct PresignedPost {
    /// POST target URL
    pub url: String,
    /// Object key
    pub key: String,
    /// Base64 policy document
    pub policy: String,
    /// Signing algorithm ("AWS4-HMAC-SHA256")
    #[serde(rename = "x-amz-algorithm")]
    pub algorithm: String,
    /// Credential scope string
    #[serde(rename = "x-amz-credential")]
    pub credential: String,
    /// Request timestamp (ISO 8601 basic)
    #[serde(rename = "x-amz-date")]
    pub date: String,
    /// Policy signature
    #[serde(rename = "x-amz-signature")]
    pub signature: String,
}

/// Upload constraints embedded in the policy.
#[derive(Debug, Clone)]
pub struct PostConditions {
    /// Inclusive byte-size range the store will accept
    pub content_length_range: (u64, u64),
    /// Required Content-Type prefix (e.g. "video/")
    pub content_type_prefix: String,
}

impl ObjectStore {
    /// Create a presigned POST policy for a direct upload to `bucket`/`key`.
    pub fn presign_post(
        &self,
        bucket: &str,
        key: &str,
        conditions: &PostConditions,
        expires_in: std::time::Duration,
    ) -> StorageResult<PresignedPost> {
        let config = self.config();
        let now = Utc::now();
        let expiration = now
            + ChronoDuration::from_std(expires_in)
                .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let credential = format!(
            "{}/{}/{}/s3/aws4_request",
            config.access_key_id, date_stamp, config.region
        );

        let policy_doc = serde_json::json!({
            "expiration": format_expiration(&expiration),
            "conditions": [
                {"bucket": bucket},
                {"key": key},
                ["content-length-range",
                    conditions.content_length_range.0,
                    conditions.content_length_range.1],
                ["starts-with", "$Content-Type", conditions.content_type_prefix],
                {"x-amz-algorithm": "AWS4-HMAC-SHA256"},
                {"x-amz-credential": credential},
                {"x-amz-date": amz_date},
            ],
        });

        let policy = BASE64.encode(serde_json::to_vec(&policy_doc)?);
        let signing_key = derive_signing_key(
            &config.secret_access_key,
            &date_stamp,
            &config.region,
            "s3",
        )?;
        let signature = hex_hmac(&signing_key, policy.as_bytes())?;

        Ok(PresignedPost {
            url: format!("{}/{}", config.endpoint_url.trim_end_matches('/'), bucket),
            key: key.to_string(),
            policy,
            algorithm: "AWS4-HMAC-SHA256".to_string(),
            credential,
            date: amz_date,
            signature,
        })
    }
}

fn format_expiration(when: &DateTime<Utc>) -> String {
    when.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// SigV4 key derivation: date -> region -> service -> "aws4_request".
fn derive_signing_key(
    secret: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> StorageResult<Vec<u8>> {
    let k_date = raw_hmac(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes())?;
    let k_region = raw_hmac(&k_date, region.as_bytes())?;
    let k_service = raw_hmac(&k_region, service.as_bytes())?;
    raw_hmac(&k_service, b"aws4_request")
}

fn raw_hmac(key: &[u8], data: &[u8]) -> StorageResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::PresignFailed(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hex_hmac(key: &[u8], data: &[u8]) -> StorageResult<String> {
    let bytes = raw_hmac(key, data)?;
    Ok(bytes.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_is_deterministic() {
        let k1 = derive_signing_key("secret", "20260101", "us-east-1", "s3").unwrap();
        let k2 = derive_signing_key("secret", "20260101", "us-east-1", "s3").unwrap();
        assert_eq!(k1, k2);

        let k3 = derive_signing_key("secret", "20260102", "us-east-1", "s3").unwrap();
        assert_ne!(k1, k3);
    }

    #[test]
    fn test_hex_signature_shape() {
        let key = derive_signing_key("secret", "20260101", "auto", "s3").unwrap();
        let sig = hex_hmac(&key, b"policy").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
