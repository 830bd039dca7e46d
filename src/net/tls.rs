//! TLS trust configuration and certificate loading.
//!
//! Trust is always an explicit choice of whoever builds the connector:
//! either a keystore of PEM certificates, or [`TlsTrust::TrustAny`], which
//! accepts every server certificate and exists for parity with peers that
//! present self-signed certificates.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use thiserror::Error;

use crate::config::{TlsConfig, TrustMode};

/// Errors while loading trust material or building a TLS client config.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("keystore {0:?} contains no certificates")]
    NoCertificates(PathBuf),

    #[error("keystore trust selected but no keystore path configured")]
    MissingKeystore,

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
}

/// PEM trust material loaded from disk.
#[derive(Debug, Clone)]
pub struct Keystore {
    trusted: Vec<CertificateDer<'static>>,
    client_chain: Vec<CertificateDer<'static>>,
    client_key: Option<Arc<PrivateKeyDer<'static>>>,
}

impl Keystore {
    /// Load a keystore.
    ///
    /// `path` holds the trusted certificates and optionally a private key.
    /// When a key is present it is presented as client identity together with
    /// the chain from `client_cert` (or, without one, the keystore's own
    /// certificates).
    pub fn load(path: &Path, client_cert: Option<&Path>) -> Result<Self, TlsError> {
        let trusted = read_certs(path)?;
        if trusted.is_empty() {
            return Err(TlsError::NoCertificates(path.to_path_buf()));
        }

        let mut reader = open(path)?;
        let client_key = rustls_pemfile::private_key(&mut reader)
            .map_err(|source| TlsError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .map(Arc::new);

        let client_chain = match client_cert {
            Some(chain) => read_certs(chain)?,
            None => trusted.clone(),
        };

        Ok(Self {
            trusted,
            client_chain,
            client_key,
        })
    }

    /// Number of trusted certificates.
    pub fn trusted_len(&self) -> usize {
        self.trusted.len()
    }

    /// Whether the keystore carries a client identity.
    pub fn has_client_identity(&self) -> bool {
        self.client_key.is_some()
    }
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// How the connector trusts TLS servers.
#[derive(Debug, Clone)]
pub enum TlsTrust {
    /// Accept any certificate. Insecure.
    TrustAny,
    /// Trust only what the keystore holds.
    Keystore(Keystore),
}

impl TlsTrust {
    /// Resolve trust from configuration, loading the keystore if one is named.
    pub fn from_config(config: &TlsConfig) -> Result<Self, TlsError> {
        match config.trust {
            TrustMode::TrustAny => Ok(TlsTrust::TrustAny),
            TrustMode::Keystore => {
                let path = config
                    .keystore_path
                    .as_deref()
                    .ok_or(TlsError::MissingKeystore)?;
                let keystore = Keystore::load(
                    Path::new(path),
                    config.client_cert_path.as_deref().map(Path::new),
                )?;
                Ok(TlsTrust::Keystore(keystore))
            }
        }
    }
}

/// Crypto provider offering every cipher suite rustls supports.
fn full_provider() -> Arc<CryptoProvider> {
    Arc::new(CryptoProvider {
        cipher_suites: rustls::crypto::ring::ALL_CIPHER_SUITES.to_vec(),
        ..rustls::crypto::ring::default_provider()
    })
}

/// Build the rustls client configuration for a trust choice.
pub fn client_config(trust: &TlsTrust) -> Result<Arc<ClientConfig>, TlsError> {
    let provider = full_provider();
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let config = match trust {
        TlsTrust::TrustAny => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(TrustAnyCertificate(provider)))
            .with_no_client_auth(),
        TlsTrust::Keystore(keystore) => {
            let mut roots = RootCertStore::empty();
            let (added, ignored) = roots.add_parsable_certificates(keystore.trusted.clone());
            if ignored > 0 {
                tracing::warn!(added, ignored, "Some keystore certificates could not be parsed");
            }
            let builder = builder.with_root_certificates(roots);
            match &keystore.client_key {
                Some(key) => builder
                    .with_client_auth_cert(keystore.client_chain.clone(), key.clone_key())?,
                None => builder.with_no_client_auth(),
            }
        }
    };

    Ok(Arc::new(config))
}

/// Verifier that accepts every server certificate but still checks that the
/// handshake was signed by the presented key.
#[derive(Debug)]
struct TrustAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for TrustAnyCertificate {
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
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
