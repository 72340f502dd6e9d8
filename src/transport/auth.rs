//! Credential material accepted by [`HttpExecutor`](super::HttpExecutor).
//!
//! Mirrors the shape of `kube_client::client::auth::Auth`, trimmed
//! to the three construction paths this crate's facade exposes: a bare bearer token, a
//! basic-auth username/password pair, and a client certificate/key pair loaded from a
//! kubeconfig.
use secrecy::SecretString;

/// How an [`HttpExecutor`](super::HttpExecutor) authenticates to the API server.
pub enum Credentials {
    /// `Authorization: Bearer <token>`.
    Bearer(SecretString),
    /// `Authorization: Basic <base64(username:password)>`.
    Basic {
        /// Username; not considered secret.
        username: String,
        /// Password.
        password: SecretString,
    },
    /// mTLS client identity, PEM-encoded, as read from a kubeconfig's
    /// `client-certificate-data`/`client-key-data` fields.
    ClientCertificate {
        /// PEM-encoded certificate chain.
        cert_pem: String,
        /// PEM-encoded private key.
        key_pem: SecretString,
    },
}
