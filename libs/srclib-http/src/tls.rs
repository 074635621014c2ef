//! HTTPS connector construction.
//!
//! System roots are read from the OS store once per process.

use crate::config::{TransportSecurity, TrustRoots};
use crate::error::HttpError;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls_pki_types::CertificateDer;
use std::sync::{Arc, OnceLock};

static SYSTEM_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

fn system_roots() -> &'static [CertificateDer<'static>] {
    SYSTEM_ROOTS.get_or_init(|| {
        let loaded = rustls_native_certs::load_native_certs();
        for err in &loaded.errors {
            tracing::warn!(error = %err, "skipping unreadable system root certificate");
        }
        tracing::debug!(count = loaded.certs.len(), "loaded system root certificates");
        loaded.certs
    })
}

/// The installed process-wide rustls provider, else aws-lc-rs.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn tls_error(err: impl std::error::Error + Send + Sync + 'static) -> HttpError {
    HttpError::Tls(Box::new(err))
}

fn system_client_config() -> Result<rustls::ClientConfig, HttpError> {
    let mut store = rustls::RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(system_roots().iter().cloned());
    if added == 0 {
        return Err(HttpError::Tls(
            format!("no usable system root certificates ({ignored} unparsable)").into(),
        ));
    }

    Ok(rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(tls_error)?
        .with_root_certificates(store)
        .with_no_client_auth())
}

/// HTTPS connector anchored at `roots`, also dialing `http://` when
/// `transport` allows it. ALPN offers h2 and http/1.1.
///
/// # Errors
/// `HttpError::Tls` if the crypto provider cannot be configured or
/// `TrustRoots::System` yields no usable certificate.
pub fn https_connector(
    roots: TrustRoots,
    transport: TransportSecurity,
) -> Result<HttpsConnector<HttpConnector>, HttpError> {
    let builder = match roots {
        TrustRoots::Bundled => HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(tls_error)?,
        TrustRoots::System => HttpsConnectorBuilder::new().with_tls_config(system_client_config()?),
    };

    let connector = match transport {
        TransportSecurity::AllowInsecureHttp => builder.https_or_http().enable_all_versions().build(),
        TransportSecurity::TlsOnly => builder.https_only().enable_all_versions().build(),
    };
    Ok(connector)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_system_roots_loaded_once() {
        assert!(std::ptr::eq(system_roots(), system_roots()));
    }

    #[test]
    fn test_bundled_connector_builds_for_both_modes() {
        assert!(https_connector(TrustRoots::Bundled, TransportSecurity::TlsOnly).is_ok());
        assert!(https_connector(TrustRoots::Bundled, TransportSecurity::AllowInsecureHttp).is_ok());
    }

    #[test]
    fn test_system_connector_reports_tls_error_or_builds() {
        // CI containers may ship without an OS certificate store.
        match https_connector(TrustRoots::System, TransportSecurity::TlsOnly) {
            Ok(_) | Err(HttpError::Tls(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
