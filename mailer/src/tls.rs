//! # TLS
//!
//! Module dedicated to TLS negotiation over an already connected
//! stream, used both for implicit TLS and for STARTTLS upgrades.

use std::{fmt, sync::Arc};

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    pki_types::{CertificateDer, ServerName, UnixTime},
    ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme, StreamOwned,
};
use rustls_platform_verifier::ConfigVerifierExt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::stream::Stream;

/// The global `Result` alias of the module.
pub type Result<T> = std::result::Result<T, Error>;

/// The global `Error` enum of the module.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot negotiate tls: stream is already encrypted")]
    AlreadyEncryptedError,
    #[error("cannot negotiate tls: invalid server name {0}")]
    InvalidServerNameError(String),
    #[error("cannot create tls connection")]
    CreateTlsConnectionError(#[source] rustls::Error),
    #[error("cannot complete tls handshake with {1}")]
    TlsHandshakeError(#[source] std::io::Error, String),
}

/// The TLS upgrade collaborator.
///
/// Turns a plain stream into an encrypted one.
pub trait TlsUpgrade: Send + Sync {
    fn upgrade(&self, host: &str, stream: Stream) -> Result<Stream>;
}

impl<T: TlsUpgrade + ?Sized> TlsUpgrade for Arc<T> {
    fn upgrade(&self, host: &str, stream: Stream) -> Result<Stream> {
        (**self).upgrade(host, stream)
    }
}

/// The default TLS upgrade, based on rustls.
///
/// Server certificates are checked by the platform verifier, unless
/// the upgrade is insecure.
#[derive(Clone, Debug, Default)]
pub struct RustlsUpgrade {
    insecure: bool,
}

impl RustlsUpgrade {
    pub fn new(insecure: bool) -> Self {
        Self { insecure }
    }

    fn config(&self) -> ClientConfig {
        if self.insecure {
            warn!("server certificate verification disabled");
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoCertVerifier))
                .with_no_client_auth()
        } else {
            ClientConfig::with_platform_verifier()
        }
    }
}

impl TlsUpgrade for RustlsUpgrade {
    fn upgrade(&self, host: &str, stream: Stream) -> Result<Stream> {
        let Stream::Tcp(tcp) = stream else {
            return Err(Error::AlreadyEncryptedError);
        };

        let server_name = ServerName::try_from(host.to_owned())
            .map_err(|_| Error::InvalidServerNameError(host.to_owned()))?;
        let conn = ClientConnection::new(Arc::new(self.config()), server_name)
            .map_err(Error::CreateTlsConnectionError)?;
        let mut tls = StreamOwned::new(conn, tcp);

        while tls.conn.is_handshaking() {
            tls.conn
                .complete_io(&mut tls.sock)
                .map_err(|err| Error::TlsHandshakeError(err, host.to_owned()))?;
        }

        debug!(
            host,
            version = ?tls.conn.protocol_version(),
            cipher = ?tls.conn.negotiated_cipher_suite().map(|suite| suite.suite()),
            "tls handshake completed"
        );

        Ok(Stream::Tls(Box::new(tls)))
    }
}

/// Certificate verifier accepting any certificate.
struct NoCertVerifier;

impl fmt::Debug for NoCertVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoCertVerifier")
    }
}

impl ServerCertVerifier for NoCertVerifier {
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
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
