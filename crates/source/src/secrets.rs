//! Secrets store backends
//!
//! `AwsSecretsManager` talks to the Secrets Manager JSON API directly over
//! blocking HTTPS with SigV4 signing. `StaticSecrets` is an in-memory stand-in.

use crate::credentials::{non_empty_var, AwsCredentials};
use crate::sigv4::{self, SigningParams};
use base64::Engine;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const SERVICE: &str = "secretsmanager";
const TARGET: &str = "secretsmanager.GetSecretValue";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const VERSION_STAGE: &str = "AWSCURRENT";

pub const ENDPOINT_VAR: &str = "AWS_ENDPOINT_URL_SECRETS_MANAGER";
pub const GLOBAL_ENDPOINT_VAR: &str = "AWS_ENDPOINT_URL";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no AWS credentials found in environment, shared credentials file, container or instance metadata")]
    MissingCredentials,

    #[error("invalid AWS credentials: {0}")]
    InvalidCredentials(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("malformed response: {0}")]
    InvalidResponse(String),

    #[error("secret {0} has no string or binary value")]
    EmptySecret(String),

    #[error("secret {0} not found")]
    NotFound(String),
}

/// Fetches secret strings by region and name
pub trait SecretsStore: Send + Sync {
    /// Fetch the current version of a secret
    fn get_secret_string(&self, region: &str, secret_name: &str) -> Result<String, BackendError>;
}

// ============================================================================
// Static secrets
// ============================================================================

/// In-memory secrets keyed by region and name
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    secrets: HashMap<(String, String), String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(
        mut self,
        region: impl Into<String>,
        secret_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.secrets
            .insert((region.into(), secret_name.into()), value.into());
        self
    }
}

impl SecretsStore for StaticSecrets {
    fn get_secret_string(&self, region: &str, secret_name: &str) -> Result<String, BackendError> {
        self.secrets
            .get(&(region.to_string(), secret_name.to_string()))
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("{region}/{secret_name}")))
    }
}

// ============================================================================
// AWS Secrets Manager
// ============================================================================

/// Secrets Manager client configuration
#[derive(Debug, Clone)]
pub struct SecretsManagerConfig {
    /// Endpoint override, e.g. a LocalStack URL. When unset the regional
    /// `https://secretsmanager.<region>.amazonaws.com` endpoint is used.
    pub endpoint: Option<String>,
    /// Overall request timeout
    pub timeout: Duration,
}

impl Default for SecretsManagerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl SecretsManagerConfig {
    /// Default configuration with endpoint overrides taken from the environment
    pub fn from_env() -> Self {
        Self {
            endpoint: non_empty_var(ENDPOINT_VAR).or_else(|| non_empty_var(GLOBAL_ENDPOINT_VAR)),
            ..Self::default()
        }
    }

    fn endpoint_for(&self, region: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{SERVICE}.{region}.amazonaws.com"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueRequest<'a> {
    secret_id: &'a str,
    version_stage: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetSecretValueResponse {
    secret_string: Option<String>,
    secret_binary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AwsErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Blocking AWS Secrets Manager client
///
/// Each fetch runs on a short-lived thread of its own, which builds, uses
/// and drops the blocking HTTP client there. Calling it from inside an async
/// runtime blocks the calling task until the fetch finishes.
pub struct AwsSecretsManager {
    config: SecretsManagerConfig,
    credentials: Option<AwsCredentials>,
}

impl AwsSecretsManager {
    pub fn new(config: SecretsManagerConfig) -> Self {
        Self {
            config,
            credentials: None,
        }
    }

    /// Client configured from the environment; credentials go through the
    /// default provider chain on every fetch
    pub fn from_env() -> Self {
        Self::new(SecretsManagerConfig::from_env())
    }

    /// Use fixed credentials instead of the provider chain
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn decode_response(secret_name: &str, body: &str) -> Result<String, BackendError> {
        let response: GetSecretValueResponse = serde_json::from_str(body)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        if let Some(secret) = response.secret_string {
            return Ok(secret);
        }

        let encoded = response
            .secret_binary
            .ok_or_else(|| BackendError::EmptySecret(secret_name.to_string()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| BackendError::InvalidResponse(format!("SecretBinary: {e}")))?;

        String::from_utf8(bytes)
            .map_err(|e| BackendError::InvalidResponse(format!("SecretBinary: {e}")))
    }

    fn decode_error(status: u16, body: &str) -> BackendError {
        let parsed: Option<AwsErrorBody> = serde_json::from_str(body).ok();
        let (code, message) = match parsed {
            Some(error) => (
                error
                    .error_type
                    .map(|t| t.rsplit('#').next().unwrap_or_default().to_string())
                    .unwrap_or_else(|| "UnknownError".to_string()),
                error.message.unwrap_or_default(),
            ),
            None => ("UnknownError".to_string(), body.to_string()),
        };

        BackendError::Api {
            status,
            code,
            message,
        }
    }

    fn fetch(&self, region: &str, secret_name: &str) -> Result<String, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.config.timeout)
            .build()?;

        let chain_credentials;
        let credentials = match &self.credentials {
            Some(credentials) => credentials,
            None => {
                chain_credentials = AwsCredentials::from_default_chain(&client)?;
                &chain_credentials
            }
        };
        let endpoint = self.config.endpoint_for(region);
        let url = reqwest::Url::parse(&format!("{endpoint}/"))
            .map_err(|e| BackendError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(BackendError::InvalidEndpoint(format!(
                    "{endpoint} has no host"
                )))
            }
        };

        let body = serde_json::to_vec(&GetSecretValueRequest {
            secret_id: secret_name,
            version_stage: VERSION_STAGE,
        })
        .map_err(|e| BackendError::InvalidResponse(format!("request body: {e}")))?;

        let params = SigningParams {
            access_key_id: &credentials.access_key_id,
            secret_access_key: credentials.secret_access_key.expose_secret(),
            region,
            service: SERVICE,
            time: chrono::Utc::now(),
        };
        let amz_date = params.amz_date();

        let mut headers = vec![
            ("content-type", CONTENT_TYPE),
            ("host", host.as_str()),
            ("x-amz-date", amz_date.as_str()),
            ("x-amz-target", TARGET),
        ];
        if let Some(token) = &credentials.session_token {
            headers.push(("x-amz-security-token", token.expose_secret()));
        }
        let authorization = sigv4::authorization(&params, "POST", url.path(), &headers, &body);

        debug!(region, secret_name, endpoint = %endpoint, "Fetching secret");

        let mut request = client.post(url).body(body);
        for (name, value) in headers.iter().filter(|(name, _)| *name != "host") {
            request = request.header(*name, *value);
        }
        let response = request.header("authorization", authorization).send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            let error = Self::decode_error(status.as_u16(), &text);
            warn!(region, secret_name, "Secrets Manager request failed: {}", error);
            return Err(error);
        }

        Self::decode_response(secret_name, &text)
    }
}

impl SecretsStore for AwsSecretsManager {
    fn get_secret_string(&self, region: &str, secret_name: &str) -> Result<String, BackendError> {
        // reqwest's blocking client owns a runtime that may not be created or
        // dropped on an async worker thread
        thread::scope(|scope| {
            scope
                .spawn(|| self.fetch(region, secret_name))
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        })
    }
}
