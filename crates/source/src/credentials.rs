//! AWS credential resolution
//!
//! Credentials are looked up the way the AWS SDKs do it:
//! 1. `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
//! 2. the shared credentials file (`AWS_SHARED_CREDENTIALS_FILE` or
//!    `~/.aws/credentials`), profile `AWS_PROFILE` or `default`
//! 3. the container credentials endpoint (ECS, EKS pod identity)
//! 4. EC2 instance metadata (IMDSv2)
//!
//! The first provider that is configured wins. A configured provider that
//! fails stops the chain instead of falling through to the next one.

use crate::BackendError;
use reqwest::blocking::Client;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";
pub const PROFILE_VAR: &str = "AWS_PROFILE";
pub const SHARED_CREDENTIALS_FILE_VAR: &str = "AWS_SHARED_CREDENTIALS_FILE";
pub const CONTAINER_RELATIVE_URI_VAR: &str = "AWS_CONTAINER_CREDENTIALS_RELATIVE_URI";
pub const CONTAINER_FULL_URI_VAR: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
pub const CONTAINER_AUTH_TOKEN_VAR: &str = "AWS_CONTAINER_AUTHORIZATION_TOKEN";
pub const IMDS_DISABLED_VAR: &str = "AWS_EC2_METADATA_DISABLED";
pub const IMDS_ENDPOINT_VAR: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";

const DEFAULT_PROFILE: &str = "default";
const CONTAINER_ENDPOINT: &str = "http://169.254.170.2";
const IMDS_ENDPOINT: &str = "http://169.254.169.254";
const IMDS_TOKEN_TTL_SECONDS: &str = "21600";
const METADATA_TIMEOUT: Duration = Duration::from_secs(1);

/// AWS access key material
#[derive(Debug)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

/// Temporary credentials as served by the container and instance endpoints
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IssuedCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
}

impl From<IssuedCredentials> for AwsCredentials {
    fn from(issued: IssuedCredentials) -> Self {
        Self {
            access_key_id: issued.access_key_id,
            secret_access_key: SecretString::from(issued.secret_access_key),
            session_token: issued
                .token
                .filter(|token| !token.is_empty())
                .map(SecretString::from),
        }
    }
}

pub(crate) fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

impl AwsCredentials {
    /// Resolve credentials through the full provider chain
    ///
    /// `client` is used for the container and instance metadata endpoints.
    pub fn from_default_chain(client: &Client) -> Result<Self, BackendError> {
        if let Some(credentials) = Self::from_env()? {
            debug!("Using AWS credentials from environment");
            return Ok(credentials);
        }

        let profile = non_empty_var(PROFILE_VAR).unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        if let Some(path) = shared_credentials_path() {
            if let Some(credentials) = Self::from_profile_file(&path, &profile)? {
                debug!(
                    profile = %profile,
                    path = %path.display(),
                    "Using AWS credentials from shared credentials file"
                );
                return Ok(credentials);
            }
        }

        if let Some(uri) = container_credentials_uri() {
            debug!(uri = %uri, "Using AWS credentials from container endpoint");
            return Self::from_container(client, &uri);
        }

        let imds_disabled = non_empty_var(IMDS_DISABLED_VAR)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        if !imds_disabled {
            let endpoint =
                non_empty_var(IMDS_ENDPOINT_VAR).unwrap_or_else(|| IMDS_ENDPOINT.to_string());
            if let Some(credentials) = Self::from_instance_metadata(client, &endpoint)? {
                debug!("Using AWS credentials from instance metadata");
                return Ok(credentials);
            }
        }

        Err(BackendError::MissingCredentials)
    }

    /// Read credentials from the standard AWS environment variables
    ///
    /// `None` when no access key is set. An access key without a secret key
    /// is an error.
    pub fn from_env() -> Result<Option<Self>, BackendError> {
        let Some(access_key_id) = non_empty_var(ACCESS_KEY_ID_VAR) else {
            return Ok(None);
        };
        let secret_access_key = non_empty_var(SECRET_ACCESS_KEY_VAR).ok_or_else(|| {
            BackendError::InvalidCredentials(format!(
                "{ACCESS_KEY_ID_VAR} is set but {SECRET_ACCESS_KEY_VAR} is not"
            ))
        })?;

        Ok(Some(Self {
            access_key_id,
            secret_access_key: SecretString::from(secret_access_key),
            session_token: non_empty_var(SESSION_TOKEN_VAR).map(SecretString::from),
        }))
    }

    /// Read a profile from a shared credentials file
    ///
    /// `None` when the file or the profile does not exist.
    pub fn from_profile_file(path: &Path, profile: &str) -> Result<Option<Self>, BackendError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BackendError::InvalidCredentials(format!(
                    "{}: {e}",
                    path.display()
                )))
            }
        };

        let Some(mut section) = parse_profile(&contents, profile) else {
            return Ok(None);
        };
        let mut required = |key: &str| {
            section
                .remove(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    BackendError::InvalidCredentials(format!(
                        "profile {profile} in {} has no {key}",
                        path.display()
                    ))
                })
        };
        let access_key_id = required("aws_access_key_id")?;
        let secret_access_key = required("aws_secret_access_key")?;

        Ok(Some(Self {
            access_key_id,
            secret_access_key: SecretString::from(secret_access_key),
            session_token: section
                .remove("aws_session_token")
                .filter(|token| !token.is_empty())
                .map(SecretString::from),
        }))
    }

    fn from_container(client: &Client, uri: &str) -> Result<Self, BackendError> {
        let mut request = client.get(uri).timeout(METADATA_TIMEOUT);
        if let Some(token) = non_empty_var(CONTAINER_AUTH_TOKEN_VAR) {
            request = request.header("authorization", token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::InvalidCredentials(format!(
                "container endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        parse_issued(&response.text()?)
    }

    /// `None` when no metadata service answers or no role is attached
    fn from_instance_metadata(client: &Client, endpoint: &str) -> Result<Option<Self>, BackendError> {
        let endpoint = endpoint.trim_end_matches('/');

        let token = match client
            .put(format!("{endpoint}/latest/api/token"))
            .header("x-aws-ec2-metadata-token-ttl-seconds", IMDS_TOKEN_TTL_SECONDS)
            .timeout(METADATA_TIMEOUT)
            .send()
        {
            Ok(response) if response.status().is_success() => response.text()?,
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Instance metadata token refused");
                return Ok(None);
            }
            Err(e) => {
                debug!("Instance metadata unavailable: {}", e);
                return Ok(None);
            }
        };

        let roles_url = format!("{endpoint}/latest/meta-data/iam/security-credentials/");
        let response = client
            .get(&roles_url)
            .header("x-aws-ec2-metadata-token", &token)
            .timeout(METADATA_TIMEOUT)
            .send()?;
        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "No instance role attached");
            return Ok(None);
        }
        let roles = response.text()?;
        let Some(role) = roles.lines().map(str::trim).find(|line| !line.is_empty()) else {
            return Ok(None);
        };

        let response = client
            .get(format!("{roles_url}{role}"))
            .header("x-aws-ec2-metadata-token", &token)
            .timeout(METADATA_TIMEOUT)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::InvalidCredentials(format!(
                "instance metadata returned HTTP {} for role {role}",
                status.as_u16()
            )));
        }

        parse_issued(&response.text()?).map(Some)
    }
}

fn parse_issued(body: &str) -> Result<AwsCredentials, BackendError> {
    serde_json::from_str::<IssuedCredentials>(body)
        .map(AwsCredentials::from)
        .map_err(|e| BackendError::InvalidCredentials(format!("credentials response: {e}")))
}

fn shared_credentials_path() -> Option<PathBuf> {
    non_empty_var(SHARED_CREDENTIALS_FILE_VAR)
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".aws").join("credentials")))
}

fn container_credentials_uri() -> Option<String> {
    non_empty_var(CONTAINER_RELATIVE_URI_VAR)
        .map(|path| format!("{CONTAINER_ENDPOINT}{path}"))
        .or_else(|| non_empty_var(CONTAINER_FULL_URI_VAR))
}

/// Keys of one profile in an INI-style AWS file
///
/// Accepts both `[name]` (credentials file) and `[profile name]` (config
/// file) headers. Keys are lowercased; a repeated profile merges.
fn parse_profile(contents: &str, profile: &str) -> Option<HashMap<String, String>> {
    let mut section: Option<HashMap<String, String>> = None;
    let mut in_profile = false;

    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let header = header.trim();
            let name = header
                .strip_prefix("profile ")
                .map(str::trim)
                .unwrap_or(header);
            in_profile = name == profile;
            if in_profile {
                section.get_or_insert_with(HashMap::new);
            }
            continue;
        }

        if !in_profile {
            continue;
        }
        if let (Some(section), Some((key, value))) = (section.as_mut(), line.split_once('=')) {
            section.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;

    const CREDENTIALS_FILE: &str = r#"
# shared credentials
[default]
aws_access_key_id = AKIDDEFAULT
aws_secret_access_key = default-secret

[staging]
AWS_ACCESS_KEY_ID=AKIDSTAGING
aws_secret_access_key=staging-secret
aws_session_token = staging-token

[profile broken]
aws_access_key_id = AKIDBROKEN
"#;

    fn credentials_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CREDENTIALS_FILE.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_named_profile() {
        let section = parse_profile(CREDENTIALS_FILE, "staging").unwrap();
        assert_eq!(section["aws_access_key_id"], "AKIDSTAGING");
        assert_eq!(section["aws_session_token"], "staging-token");
        assert!(parse_profile(CREDENTIALS_FILE, "prod").is_none());
    }

    #[test]
    fn test_parse_config_style_header() {
        let section = parse_profile(CREDENTIALS_FILE, "broken").unwrap();
        assert_eq!(section.len(), 1);
    }

    #[test]
    fn test_profile_file_credentials() {
        let file = credentials_file();

        let credentials = AwsCredentials::from_profile_file(file.path(), "default")
            .unwrap()
            .unwrap();
        assert_eq!(credentials.access_key_id, "AKIDDEFAULT");
        assert_eq!(credentials.secret_access_key.expose_secret(), "default-secret");
        assert!(credentials.session_token.is_none());

        let credentials = AwsCredentials::from_profile_file(file.path(), "staging")
            .unwrap()
            .unwrap();
        assert_eq!(
            credentials.session_token.unwrap().expose_secret(),
            "staging-token"
        );
    }

    #[test]
    fn test_profile_without_secret_key() {
        let file = credentials_file();
        let err = AwsCredentials::from_profile_file(file.path(), "broken").unwrap_err();
        assert!(
            matches!(err, BackendError::InvalidCredentials(ref message) if message.contains("aws_secret_access_key"))
        );
    }

    #[test]
    fn test_missing_file_or_profile() {
        let file = credentials_file();
        assert!(AwsCredentials::from_profile_file(file.path(), "prod")
            .unwrap()
            .is_none());

        let dir = tempfile::tempdir().unwrap();
        assert!(
            AwsCredentials::from_profile_file(&dir.path().join("credentials"), "default")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_issued_credentials_response() {
        let credentials = parse_issued(
            r#"{"Code":"Success","AccessKeyId":"ASIAROLE","SecretAccessKey":"role-secret","Token":"role-token","Expiration":"2030-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(credentials.access_key_id, "ASIAROLE");
        assert!(credentials.session_token.is_some());

        assert!(matches!(
            parse_issued("<html>"),
            Err(BackendError::InvalidCredentials(_))
        ));
    }

    #[test]
    #[serial]
    fn test_env_credentials() {
        temp_env::with_vars(
            [
                (ACCESS_KEY_ID_VAR, Some("AKIDENV")),
                (SECRET_ACCESS_KEY_VAR, Some("env-secret")),
                (SESSION_TOKEN_VAR, None),
            ],
            || {
                let credentials = AwsCredentials::from_env().unwrap().unwrap();
                assert_eq!(credentials.access_key_id, "AKIDENV");
                assert!(credentials.session_token.is_none());
            },
        );

        temp_env::with_vars_unset([ACCESS_KEY_ID_VAR, SECRET_ACCESS_KEY_VAR], || {
            assert!(AwsCredentials::from_env().unwrap().is_none());
        });
    }

    #[test]
    #[serial]
    fn test_env_access_key_without_secret() {
        temp_env::with_vars(
            [
                (ACCESS_KEY_ID_VAR, Some("AKIDENV")),
                (SECRET_ACCESS_KEY_VAR, None),
            ],
            || {
                assert!(matches!(
                    AwsCredentials::from_env(),
                    Err(BackendError::InvalidCredentials(_))
                ));
            },
        );
    }

    #[test]
    #[serial]
    fn test_chain_reads_selected_profile() {
        let file = credentials_file();
        let path = file.path().to_string_lossy().into_owned();

        temp_env::with_vars(
            [
                (ACCESS_KEY_ID_VAR, None),
                (SECRET_ACCESS_KEY_VAR, None),
                (SHARED_CREDENTIALS_FILE_VAR, Some(path.as_str())),
                (PROFILE_VAR, Some("staging")),
                (IMDS_DISABLED_VAR, Some("true")),
            ],
            || {
                let credentials = AwsCredentials::from_default_chain(&Client::new()).unwrap();
                assert_eq!(credentials.access_key_id, "AKIDSTAGING");
            },
        );
    }

    #[test]
    #[serial]
    fn test_chain_with_nothing_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials").to_string_lossy().into_owned();

        temp_env::with_vars(
            [
                (ACCESS_KEY_ID_VAR, None),
                (SECRET_ACCESS_KEY_VAR, None),
                (SHARED_CREDENTIALS_FILE_VAR, Some(path.as_str())),
                (PROFILE_VAR, None),
                (CONTAINER_RELATIVE_URI_VAR, None),
                (CONTAINER_FULL_URI_VAR, None),
                (IMDS_DISABLED_VAR, Some("true")),
            ],
            || {
                assert!(matches!(
                    AwsCredentials::from_default_chain(&Client::new()),
                    Err(BackendError::MissingCredentials)
                ));
            },
        );
    }
}
