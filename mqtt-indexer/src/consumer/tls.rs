//! TLS client configuration for the broker connection.
//!
//! Certificates are always checked against the system trust store. Turning
//! hostname validation off keeps the chain check and only skips matching the
//! certificate against the broker name.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::verify_server_cert_signed_by_trust_anchor;
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{ClientConfig, DigitallySignedStruct, Error, RootCertStore, SignatureScheme};
use tracing::{debug, warn};

use crate::errors::IngestError;

/// Build the rustls client configuration for the broker.
pub(crate) fn client_config(hostname_validation: bool) -> Result<Arc<ClientConfig>, IngestError> {
    let roots = system_roots()?;

    let config = if hostname_validation {
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    } else {
        warn!("MQTT TLS hostname validation is disabled");
        let supported = rustls::crypto::ring::default_provider().signature_verification_algorithms;
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipHostnameVerification {
                roots,
                supported,
            }))
            .with_no_client_auth()
    };

    Ok(Arc::new(config))
}

fn system_roots() -> Result<RootCertStore, IngestError> {
    let certs = rustls_native_certs::load_native_certs()
        .map_err(|e| IngestError::mqtt(format!("Failed to load system certificates: {}", e)))?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    debug!(added, ignored, "Loaded system root certificates");
    Ok(roots)
}

/// Verifies the certificate chain but not the server name.
#[derive(Debug)]
struct SkipHostnameVerification {
    roots: RootCertStore,
    supported: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for SkipHostnameVerification {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            self.supported.all,
        )?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls12_signature(message, cert, dss, &self.supported)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls13_signature(message, cert, dss, &self.supported)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_validation_uses_webpki_verifier() {
        let config = client_config(true).unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("WebPkiServerVerifier"));
        assert!(!debug.contains("SkipHostnameVerification"));
    }

    #[test]
    fn test_disabled_hostname_validation_keeps_chain_check() {
        let config = client_config(false).unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("SkipHostnameVerification"));
    }

    #[test]
    fn test_skip_verifier_rejects_garbage_certificate() {
        let verifier = SkipHostnameVerification {
            roots: RootCertStore::empty(),
            supported: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        };
        let server_name = ServerName::try_from("broker.local").unwrap();

        let result = verifier.verify_server_cert(
            &CertificateDer::from(vec![0u8; 16]),
            &[],
            &server_name,
            &[],
            UnixTime::now(),
        );

        assert!(result.is_err());
        assert!(!verifier.supported_verify_schemes().is_empty());
    }
}
