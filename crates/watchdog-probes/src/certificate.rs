//! Certificate expiry probe.
//!
//! Performs a TLS handshake with each target, reads the peer's
//! certificate chain, and reports certificates that have expired or
//! expire within [`EXPIRY_WARNING_DAYS`](crate::expiry::EXPIRY_WARNING_DAYS).
//! The handshake only inspects the chain, so verification is disabled:
//! an expired chain must still be readable to be reported.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use rustls::ClientConfig;
use rustls::pki_types::{CertificateDer, ServerName};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use watchdog_core::Issue;

use crate::error::CertificateError;
use crate::expiry::{Expiry, classify_expiry, unix_now};
use crate::probe::{Probe, ProbeCategory, ProbeOutcome, until_cancelled};

/// Checks the certificate chain served at one URL.
pub struct CertificateProbe {
    url: String,
    timeout: Duration,
    tls: Result<Arc<ClientConfig>, String>,
}

impl CertificateProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            tls: inspection_config().map_err(|e| e.to_string()),
        }
    }

    /// Inspect the target and classify every certificate in its chain.
    pub async fn inspect(&self) -> Vec<Issue> {
        let url = &self.url;
        debug!(%url, "checking certificate expiry");

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return vec![Issue::danger(format!("{url}: error {e}"))],
        };
        if parsed.scheme() != "https" {
            return vec![Issue::warning(format!("{url}: no TLS enabled"))];
        }

        let chain = match &self.tls {
            Ok(tls) => fetch_peer_chain(&parsed, tls.clone(), self.timeout).await,
            Err(e) => Err(CertificateError::Setup(e.clone())),
        };
        let chain = match chain {
            Ok(chain) => chain,
            Err(e) => return vec![Issue::danger(format!("{url}: error {e}"))],
        };

        let now = unix_now();
        chain
            .iter()
            .filter_map(|der| match expiry_issue(url, der, now) {
                Ok(issue) => issue,
                Err(e) => Some(Issue::danger(format!("{url}: error {e}"))),
            })
            .collect()
    }
}

#[async_trait]
impl Probe for CertificateProbe {
    fn category(&self) -> ProbeCategory {
        ProbeCategory::Certificate
    }

    fn target(&self) -> &str {
        &self.url
    }

    async fn run(&self, cancel: &CancellationToken) -> ProbeOutcome {
        until_cancelled(cancel, self.inspect()).await
    }
}

/// Classify one DER certificate served for `url`.
pub fn expiry_issue(
    url: &str,
    der: &CertificateDer<'_>,
    now: i64,
) -> Result<Option<Issue>, CertificateError> {
    let (_, cert) = x509_parser::parse_x509_certificate(der.as_ref())
        .map_err(|e| CertificateError::Parse(e.to_string()))?;

    let issuer = cert
        .issuer()
        .iter_organization()
        .filter_map(|attr| attr.as_str().ok())
        .collect::<Vec<_>>()
        .join(", ");
    let not_after = cert.validity().not_after.timestamp();

    Ok(match classify_expiry(not_after, now) {
        Some(Expiry::Expired { days }) => Some(Issue::danger(format!(
            "{url}: certificate from {issuer} has expired {days} days"
        ))),
        Some(Expiry::ExpiresSoon { days }) => Some(Issue::warning(format!(
            "{url}: certificate from {issuer} will expire in {days} days"
        ))),
        None => None,
    })
}

/// Connect to the URL's host and return the chain the server presents.
async fn fetch_peer_chain(
    url: &Url,
    tls: Arc<ClientConfig>,
    timeout: Duration,
) -> Result<Vec<CertificateDer<'static>>, CertificateError> {
    let host = url
        .host_str()
        .ok_or(CertificateError::MissingHost)?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = url.port_or_known_default().unwrap_or(443);
    let server_name = ServerName::try_from(host.clone())
        .map_err(|e| CertificateError::ServerName(e.to_string()))?;

    let handshake = async {
        let tcp = TcpStream::connect((host.as_str(), port)).await?;
        let stream = TlsConnector::from(tls).connect(server_name, tcp).await?;
        let (_, session) = stream.get_ref();
        Ok::<_, CertificateError>(
            session
                .peer_certificates()
                .map(|chain| chain.to_vec())
                .unwrap_or_default(),
        )
    };

    tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| CertificateError::Timeout)?
}

/// Client config that accepts any chain; used for inspection only.
fn inspection_config() -> Result<Arc<ClientConfig>, CertificateError> {
    let config = ClientConfig::builder_with_provider(rustls::crypto::ring::default_provider().into())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(inspect::InspectOnly))
        .with_no_client_auth();
    Ok(Arc::new(config))
}

mod inspect {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, Error, SignatureScheme};

    /// Accepts every chain; the handshake signatures are still checked.
    #[derive(Debug)]
    pub struct InspectOnly;

    impl ServerCertVerifier for InspectOnly {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            rustls::crypto::verify_tls12_signature(
                message,
                cert,
                dss,
                &rustls::crypto::ring::default_provider().signature_verification_algorithms,
            )
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, Error> {
            rustls::crypto::verify_tls13_signature(
                message,
                cert,
                dss,
                &rustls::crypto::ring::default_provider().signature_verification_algorithms,
            )
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            rustls::crypto::ring::default_provider()
                .signature_verification_algorithms
                .supported_schemes()
        }
    }
}
