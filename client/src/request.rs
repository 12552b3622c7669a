//! Building and sending gate commands

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use gate_shared::{headers, signer, Acknowledgment, Action};
use reqwest::{Client, Request, StatusCode};
use tracing::debug;

/// How the request proves itself to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// HMAC over timestamp and path
    Signature { secret: String },
    /// Static `X-API-Key`
    ApiKey(String),
}

impl Credentials {
    /// Pick credentials from the command line; an API key wins over a secret
    pub fn from_options(secret: Option<String>, api_key: Option<String>) -> Result<Self> {
        let secret = secret.filter(|s| !s.is_empty());
        let api_key = api_key.filter(|k| !k.is_empty());

        match (api_key, secret) {
            (Some(key), _) => Ok(Credentials::ApiKey(key)),
            (None, Some(secret)) => Ok(Credentials::Signature { secret }),
            (None, None) => bail!("either GATE_API_SECRET or GATE_API_KEY must be set"),
        }
    }
}

/// Build the `GET` for `action`, authenticated for time `at`
///
/// The signature covers the final URL path, so a base URL with a path prefix
/// is signed correctly.
pub fn build_request(
    client: &Client,
    base_url: &str,
    action: Action,
    credentials: &Credentials,
    at: DateTime<Utc>,
) -> Result<Request> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), action.http_path());
    let mut request = client
        .get(&url)
        .build()
        .with_context(|| format!("invalid URL {}", url))?;

    let path = request.url().path().to_string();
    let request_headers = request.headers_mut();
    match credentials {
        Credentials::Signature { secret } => {
            let (timestamp, signature) = signer::signed_headers(&path, secret, at);
            request_headers.insert(headers::TIMESTAMP, timestamp.parse()?);
            request_headers.insert(headers::SIGNATURE, signature.parse()?);
        }
        Credentials::ApiKey(key) => {
            let value = key
                .parse()
                .context("API key is not a valid header value")?;
            request_headers.insert(headers::API_KEY, value);
        }
    }

    debug!("GET {}", url);
    Ok(request)
}

/// Send the request and require a 200 acknowledgment
pub async fn send(client: &Client, request: Request) -> Result<Acknowledgment> {
    let response = client
        .execute(request)
        .await
        .context("request to gate device failed")?;

    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        bail!("gate device answered {}: {}", status, body.trim());
    }

    response
        .json::<Acknowledgment>()
        .await
        .context("unreadable acknowledgment")
}
