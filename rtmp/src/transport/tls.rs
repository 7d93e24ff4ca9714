use super::TransportError;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use rustls::{ClientConfig, RootCertStore};
use std::path::Path;
use std::sync::Arc;

/// Builds a client configuration trusting the given roots, using the ring provider
pub fn client_config(roots: RootCertStore) -> Result<Arc<ClientConfig>, TransportError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(tls_error)?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Builds a client configuration trusting every certificate found in a PEM bundle
pub fn client_config_from_pem_file(path: impl AsRef<Path>) -> Result<Arc<ClientConfig>, TransportError> {
    let mut roots = RootCertStore::empty();
    for certificate in CertificateDer::pem_file_iter(path.as_ref()).map_err(tls_error)? {
        roots.add(certificate.map_err(tls_error)?).map_err(tls_error)?;
    }

    if roots.is_empty() {
        return Err(TransportError::Tls {
            reason: format!("no certificates found in {}", path.as_ref().display()),
        });
    }

    client_config(roots)
}

fn tls_error(error: impl std::fmt::Display) -> TransportError {
    TransportError::Tls {
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_bundle_is_a_tls_error() {
        match client_config_from_pem_file("/nonexistent/ca.pem") {
            Err(TransportError::Tls { .. }) => (),
            x => panic!("Expected Tls error, instead received {:?}", x.map(|_| ())),
        }
    }

    #[test]
    fn empty_root_store_still_builds_a_config() {
        assert!(client_config(RootCertStore::empty()).is_ok());
    }
}
