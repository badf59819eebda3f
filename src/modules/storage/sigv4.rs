//! AWS Signature v4 header signing
//!
//! rust-s3 has no call for object ACLs or per-request metadata headers, so
//! those requests are signed here and sent with reqwest.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::errors::StorageError;
use crate::core::config::SecretString;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub struct SigV4Signer {
    access_key: String,
    secret_key: SecretString,
    region: String,
    service: String,
}

impl SigV4Signer {
    pub fn new(access_key: &str, secret_key: SecretString, region: &str) -> Self {
        Self {
            access_key: access_key.to_string(),
            secret_key,
            region: region.to_string(),
            service: "s3".to_string(),
        }
    }

    /// Sign a request and return the complete header set to send.
    ///
    /// `headers` must already contain `host`; names are lowercased here.
    pub fn sign(
        &self,
        method: &str,
        canonical_uri: &str,
        canonical_query: &str,
        headers: &BTreeMap<String, String>,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, String>, StorageError> {
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = hex::encode(Sha256::digest(payload));

        let mut signed: BTreeMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), canonical_header_value(v)))
            .collect();
        signed.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        signed.insert("x-amz-date".to_string(), amz_date.clone());

        if !signed.contains_key("host") {
            return Err(StorageError::Signing("missing host header".to_string()));
        }

        // BTreeMap keeps the canonical (sorted) header order
        let canonical_headers: String = signed
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();
        let signed_headers = signed.keys().cloned().collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, canonical_uri, canonical_query, canonical_headers, signed_headers, payload_hash
        );

        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = signing_key(
            self.secret_key.expose_secret(),
            &date_stamp,
            &self.region,
            &self.service,
        )?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        signed.insert(
            "authorization".to_string(),
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, self.access_key, credential_scope, signed_headers, signature
            ),
        );

        Ok(signed)
    }
}

/// Trim the value and fold inner runs of whitespace into one space
fn canonical_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive the SigV4 signing key for a date/region/service
pub fn signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, StorageError> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::Signing(format!("HMAC key error: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Percent-encode an object key for use as a canonical URI, keeping `/`
pub fn encode_key_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
