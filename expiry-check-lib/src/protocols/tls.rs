//! TLS handshake client.
//!
//! Opens a TLS session only to look at the certificate chain the server
//! presents. With `skip_verify` set the chain is accepted whatever its trust
//! status, so expired, self-signed or mismatched certificates are still
//! returned.

use crate::error::ExpiryCheckError;
use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Anything that can perform a TLS handshake and hand back the peer's chain.
#[async_trait]
pub trait TlsHandshake: Send + Sync {
    /// Connect to `host:port`, complete a handshake within `timeout`, and
    /// return the certificate chain with the leaf first.
    async fn handshake(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
        skip_verify: bool,
    ) -> Result<Vec<CertificateDer<'static>>, ExpiryCheckError>;
}

/// rustls-based handshake client.
///
/// Verifying handshakes (`skip_verify == false`) trust only the roots given
/// to [`RustlsHandshaker::with_root_certificates`]; none by default.
#[derive(Debug, Clone)]
pub struct RustlsHandshaker {
    provider: Arc<CryptoProvider>,
    roots: Arc<RootCertStore>,
}

impl RustlsHandshaker {
    pub fn new() -> Self {
        Self {
            provider: Arc::new(rustls::crypto::ring::default_provider()),
            roots: Arc::new(RootCertStore::empty()),
        }
    }

    /// Trust anchors used when verification is requested.
    pub fn with_root_certificates(mut self, roots: RootCertStore) -> Self {
        self.roots = Arc::new(roots);
        self
    }

    fn client_config(&self, skip_verify: bool) -> Result<ClientConfig, ExpiryCheckError> {
        let builder = ClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| ExpiryCheckError::internal(format!("TLS setup failed: {}", e)))?;

        let config = if skip_verify {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate {
                    provider: self.provider.clone(),
                }))
                .with_no_client_auth()
        } else {
            builder
                .with_root_certificates(self.roots.clone())
                .with_no_client_auth()
        };

        Ok(config)
    }

    async fn connect(
        &self,
        host: &str,
        port: u16,
        skip_verify: bool,
    ) -> Result<Vec<CertificateDer<'static>>, ExpiryCheckError> {
        let connector = TlsConnector::from(Arc::new(self.client_config(skip_verify)?));
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| ExpiryCheckError::connection(host, format!("invalid server name: {}", e)))?;

        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|e| ExpiryCheckError::connection(host, e.to_string()))?;

        let mut stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| ExpiryCheckError::connection(host, e.to_string()))?;

        let chain = stream
            .get_ref()
            .1
            .peer_certificates()
            .map(|certs| certs.to_vec())
            .unwrap_or_default();

        // best-effort close_notify; the socket is dropped either way
        let _ = stream.shutdown().await;

        debug!(host, port, certificates = chain.len(), "TLS handshake complete");
        Ok(chain)
    }
}

impl Default for RustlsHandshaker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TlsHandshake for RustlsHandshaker {
    async fn handshake(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
        skip_verify: bool,
    ) -> Result<Vec<CertificateDer<'static>>, ExpiryCheckError> {
        match tokio::time::timeout(timeout, self.connect(host, port, skip_verify)).await {
            Ok(result) => result,
            Err(_) => Err(ExpiryCheckError::timeout(
                format!("TLS handshake with {}:{}", host, port),
                timeout,
            )),
        }
    }
}

/// Verifier that trusts every chain but still checks handshake signatures,
/// so the session itself is well-formed.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
