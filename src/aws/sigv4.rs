//! AWS Signature Version 4 for single-shot POST requests with an empty query.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::Credentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

pub struct SigningParams<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub service: &'a str,
    pub time: DateTime<Utc>,
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Derive the per-day signing key
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Percent-encode everything except the unreserved characters
pub fn uri_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

/// Sign a request and return the headers to add to it: `x-amz-date`,
/// `x-amz-security-token` when a session token is present, and
/// `authorization`. `headers` must not contain `host` or `x-amz-date`.
pub fn sign(
    params: &SigningParams<'_>,
    method: &str,
    host: &str,
    path: &str,
    headers: &[(&str, &str)],
    payload: &[u8],
) -> Vec<(String, String)> {
    let amz_date = params.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date = params.time.format("%Y%m%d").to_string();

    let mut signed: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    signed.push(("host".to_string(), host.to_string()));
    signed.push(("x-amz-date".to_string(), amz_date.clone()));
    if let Some(token) = &params.credentials.session_token {
        signed.push(("x-amz-security-token".to_string(), token.clone()));
    }
    signed.sort();

    let canonical_headers: String = signed
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = signed
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{method}\n{path}\n\n{canonical_headers}\n{signed_headers}\n{}",
        sha256_hex(payload)
    );

    let scope = format!("{date}/{}/{}/aws4_request", params.region, params.service);
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(
        &params.credentials.secret_access_key,
        &date,
        params.region,
        params.service,
    );
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

    let mut out = vec![("x-amz-date".to_string(), amz_date)];
    if let Some(token) = &params.credentials.session_token {
        out.push(("x-amz-security-token".to_string(), token.clone()));
    }
    out.push((
        "authorization".to_string(),
        format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            params.credentials.access_key_id
        ),
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signing_key_vector() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("i-0abc_1.2~"), "i-0abc_1.2~");
        assert_eq!(uri_encode("a b/c=d"), "a%20b%2Fc%3Dd");
    }

    #[test]
    fn test_authorization_header() {
        let credentials = Credentials::new("AKIDEXAMPLE", "secret", None);
        let params = SigningParams {
            credentials: &credentials,
            region: "us-east-1",
            service: "monitoring",
            time: Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap(),
        };
        let headers = sign(
            &params,
            "POST",
            "monitoring.us-east-1.amazonaws.com",
            "/",
            &[("Content-Type", "application/x-amz-json-1.0")],
            b"{}",
        );

        assert_eq!(headers[0], ("x-amz-date".to_string(), "20150830T123600Z".to_string()));
        let (name, auth) = &headers[1];
        assert_eq!(name, "authorization");
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/monitoring/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, Signature="
        ));
        let signature = auth.rsplit('=').next().unwrap();
        assert_eq!(signature.len(), 64);

        // Deterministic for identical input
        assert_eq!(
            headers,
            sign(
                &params,
                "POST",
                "monitoring.us-east-1.amazonaws.com",
                "/",
                &[("Content-Type", "application/x-amz-json-1.0")],
                b"{}",
            )
        );
    }

    #[test]
    fn test_session_token_is_signed() {
        let credentials = Credentials::new("ASIA", "secret", Some("session"));
        let params = SigningParams {
            credentials: &credentials,
            region: "eu-west-1",
            service: "autoscaling",
            time: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        };
        let headers = sign(&params, "POST", "autoscaling.eu-west-1.amazonaws.com", "/", &[], b"");

        assert_eq!(headers[1], ("x-amz-security-token".to_string(), "session".to_string()));
        assert!(headers[2].1.contains("SignedHeaders=host;x-amz-date;x-amz-security-token"));
    }
}
