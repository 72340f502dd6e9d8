//! TLS configuration for [`HttpExecutor`](super::HttpExecutor).
//!
//! Grounded in `kube_client::client::tls::rustls_tls`:
//! `rustls_client_config` builds a `ClientConfig` from an optional client identity and
//! falls back to the platform's native trust store; `NoCertificateVerification` is the
//! `accept_invalid_certs` escape hatch for self-signed cluster certificates presented
//! alongside a bare bearer token.
use std::sync::Arc;

use hyper_util::client::legacy::connect::HttpConnector;
use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use rustls_pemfile::Item;

use crate::error::{Result, TransportError};

use super::auth::Credentials;

type Connector = hyper_rustls::HttpsConnector<HttpConnector>;

pub(super) fn build_connector(credentials: &Credentials) -> Result<Connector> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = match credentials {
        Credentials::ClientCertificate { cert_pem, key_pem } => {
            use secrecy::ExposeSecret;
            let (chain, key) = parse_identity(cert_pem.as_bytes(), key_pem.expose_secret().as_bytes())?;
            ClientConfig::builder()
                .with_root_certificates(native_roots()?)
                .with_client_auth_cert(chain, key)
                .map_err(|e| TransportError::Tls(e.to_string()))?
        }
        Credentials::Bearer(_) | Credentials::Basic { .. } => {
            // No client identity: talk plain TLS against the cluster's CA, but accept a
            // self-signed/unverified certificate since kubedyn has no way to obtain the
            // cluster's CA bundle out of band in this construction path.
            let mut config = ClientConfig::builder()
                .with_root_certificates(native_roots()?)
                .with_no_client_auth();
            config
                .dangerous()
                .set_certificate_verifier(Arc::new(NoCertificateVerification::new()));
            config
        }
    };

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(config)
        .https_or_http()
        .enable_http1()
        .build();
    Ok(https)
}

fn native_roots() -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for err in &certs.errors {
        tracing::warn!(error = %err, "failed to load a native root certificate");
    }
    for cert in certs.certs {
        // Individual malformed roots are skipped rather than failing the whole store.
        let _ = store.add(cert);
    }
    Ok(store)
}

fn parse_identity(cert_pem: &[u8], key_pem: &[u8]) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let mut certs = Vec::new();
    for item in rustls_pemfile::certs(&mut std::io::Cursor::new(cert_pem)) {
        certs.push(item.map_err(|e| TransportError::Tls(format!("invalid client certificate PEM: {e}")))?);
    }
    if certs.is_empty() {
        return Err(TransportError::Tls("no certificates found in client-certificate-data".into()).into());
    }

    let mut reader = std::io::Cursor::new(key_pem);
    let key = loop {
        match rustls_pemfile::read_one(&mut reader)
            .map_err(|e| TransportError::Tls(format!("invalid client key PEM: {e}")))?
        {
            Some(Item::Pkcs8Key(key)) => break PrivateKeyDer::Pkcs8(key),
            Some(Item::Pkcs1Key(key)) => break PrivateKeyDer::Pkcs1(key),
            Some(Item::Sec1Key(key)) => break PrivateKeyDer::Sec1(key),
            Some(_) => continue,
            None => return Err(TransportError::Tls("no private key found in client-key-data".into()).into()),
        }
    };

    Ok((certs, key))
}

/// Disables server certificate verification entirely.
///
/// Only reachable via the bearer-token/basic-auth construction path, which has no CA
/// bundle of its own; callers that need verified TLS should use the kubeconfig path
/// (`Credentials::ClientCertificate`, or a kubeconfig carrying `certificate-authority-data`).
#[derive(Debug)]
struct NoCertificateVerification {
    supported: rustls::crypto::WebPkiSupportedAlgorithms,
}

impl NoCertificateVerification {
    fn new() -> Self {
        Self {
            supported: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.supported)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.supported)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported.supported_schemes()
    }
}
