//! Minimal kubeconfig parsing.
//!
//! Trimmed from `kube_client::config::file_config::Kubeconfig`'s shape down
//! to exactly what [`HttpExecutor`](super::HttpExecutor) construction needs: the
//! current context's server URL and either a bearer token or a client certificate/key
//! pair. Proxy settings, exec-based auth plugins, and multi-context switching are out
//! of scope for this crate.
use std::{fs, path::Path};

use base64::Engine;
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::{Error, Result, TransportError};

use super::auth::Credentials;

#[derive(Debug, Deserialize)]
struct Kubeconfig {
    clusters: Vec<NamedCluster>,
    #[serde(rename = "users")]
    auth_infos: Vec<NamedAuthInfo>,
    contexts: Vec<NamedContext>,
    #[serde(rename = "current-context")]
    current_context: String,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: Cluster,
}

#[derive(Debug, Deserialize)]
struct Cluster {
    server: String,
}

#[derive(Debug, Deserialize)]
struct NamedAuthInfo {
    name: String,
    user: AuthInfo,
}

#[derive(Debug, Deserialize, Default)]
struct AuthInfo {
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
    #[serde(rename = "client-certificate-data")]
    client_certificate_data: Option<String>,
    #[serde(rename = "client-key-data")]
    client_key_data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    context: Context,
}

#[derive(Debug, Deserialize)]
struct Context {
    cluster: String,
    user: String,
}

/// The server URL and credential extracted from a kubeconfig's current context.
pub struct ParsedKubeconfig {
    /// The cluster's `server` URL, with any trailing slash removed.
    pub master_url: String,
    /// The credential to authenticate with.
    pub credentials: Credentials,
}

/// Load and parse `path`, resolving the current context to a server URL and credential.
pub fn load(path: impl AsRef<Path>) -> Result<ParsedKubeconfig> {
    let raw = fs::read_to_string(path.as_ref())
        .map_err(|e| TransportError::Kubeconfig(format!("failed to read {}: {e}", path.as_ref().display())))?;
    let config: Kubeconfig =
        serde_yaml::from_str(&raw).map_err(|e| TransportError::Kubeconfig(format!("invalid kubeconfig yaml: {e}")))?;

    let context = config
        .contexts
        .iter()
        .find(|c| c.name == config.current_context)
        .ok_or_else(|| TransportError::Kubeconfig(format!("no context named {}", config.current_context)))?;

    let cluster = config
        .clusters
        .iter()
        .find(|c| c.name == context.context.cluster)
        .ok_or_else(|| TransportError::Kubeconfig(format!("no cluster named {}", context.context.cluster)))?;

    let auth_info = config
        .auth_infos
        .iter()
        .find(|u| u.name == context.context.user)
        .ok_or_else(|| TransportError::Kubeconfig(format!("no user named {}", context.context.user)))?;

    let credentials = credentials_from(&auth_info.user)?;

    Ok(ParsedKubeconfig {
        master_url: cluster.cluster.server.trim_end_matches('/').to_string(),
        credentials,
    })
}

fn credentials_from(user: &AuthInfo) -> Result<Credentials> {
    if let (Some(cert), Some(key)) = (&user.client_certificate_data, &user.client_key_data) {
        let cert_pem = decode_pem_field(cert)?;
        let key_pem = decode_pem_field(key)?;
        return Ok(Credentials::ClientCertificate {
            cert_pem,
            key_pem: SecretString::from(key_pem),
        });
    }
    if let Some(token) = &user.token {
        return Ok(Credentials::Bearer(SecretString::from(token.clone())));
    }
    if let (Some(username), Some(password)) = (&user.username, &user.password) {
        return Ok(Credentials::Basic {
            username: username.clone(),
            password: SecretString::from(password.clone()),
        });
    }
    Err(Error::Transport(TransportError::InvalidCredentials(
        "kubeconfig user has none of token, username/password, or client-certificate-data/client-key-data".into(),
    )))
}

fn decode_pem_field(data: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| TransportError::Kubeconfig(format!("invalid base64 in kubeconfig: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| TransportError::Kubeconfig(format!("kubeconfig PEM field is not utf-8: {e}")).into())
}
