//! AWS Signature Version 4 request signing
//!
//! Only what the Secrets Manager client needs: requests with an empty query
//! string, a canonical URI of `/` or a plain path, and headers supplied by
//! the caller.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Fixed inputs for signing a single request
#[derive(Clone)]
pub struct SigningParams<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

impl SigningParams<'_> {
    /// `YYYYMMDD'T'HHMMSS'Z'`, the value of the `x-amz-date` header
    pub fn amz_date(&self) -> String {
        self.time.format("%Y%m%dT%H%M%SZ").to_string()
    }

    fn short_date(&self) -> String {
        self.time.format("%Y%m%d").to_string()
    }

    fn credential_scope(&self) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            self.short_date(),
            self.region,
            self.service
        )
    }
}

/// Hex encoded SHA-256 of a payload
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the request signing key for a date, region and service
pub fn signing_key(secret_access_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret_access_key}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Lowercased, sorted, trimmed headers as `(name, value)` pairs
fn normalize_headers(headers: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut normalized: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| {
            let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
            (name.to_ascii_lowercase(), value)
        })
        .collect();
    normalized.sort();
    normalized
}

pub fn canonical_request(
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    payload: &[u8],
) -> String {
    let headers = normalize_headers(headers);
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = signed_header_names(&headers);

    format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method,
        uri,
        canonical_headers,
        signed_headers,
        hash_payload(payload)
    )
}

fn signed_header_names(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

pub fn string_to_sign(params: &SigningParams<'_>, canonical_request: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        params.amz_date(),
        params.credential_scope(),
        hash_payload(canonical_request.as_bytes())
    )
}

/// Compute the `Authorization` header value for a request
///
/// `headers` must already contain every header that will be sent and signed,
/// including `host` and `x-amz-date`.
pub fn authorization(
    params: &SigningParams<'_>,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    payload: &[u8],
) -> String {
    let canonical = canonical_request(method, uri, headers, payload);
    let to_sign = string_to_sign(params, &canonical);
    let key = signing_key(
        params.secret_access_key,
        &params.short_date(),
        params.region,
        params.service,
    );
    let signature = hex::encode(hmac(&key, to_sign.as_bytes()));

    format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM,
        params.access_key_id,
        params.credential_scope(),
        signed_header_names(&normalize_headers(headers)),
        signature
    )
}
