//! Certificate expiry of the chain a target presented.
//!
//! The probe client verifies servers with the webpki verifier and records the
//! full chain each server presented, so expiry is computed over every
//! certificate rather than only the leaf.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, DistinguishedName, RootCertStore, SignatureScheme};
use tracing::debug;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::AppError;

/// Last verified chain per server name, leaf first
#[derive(Debug, Default)]
pub struct PresentedChains {
    chains: Mutex<HashMap<String, Vec<CertificateDer<'static>>>>,
}

impl PresentedChains {
    /// Chain presented by `server`, a DNS name or an IP address without brackets
    pub fn get(&self, server: &str) -> Option<Vec<CertificateDer<'static>>> {
        self.chains.lock().get(server).cloned()
    }

    fn record(
        &self,
        server: &ServerName<'_>,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
    ) {
        let chain = std::iter::once(end_entity)
            .chain(intermediates)
            .map(|certificate| certificate.clone().into_owned())
            .collect();
        self.chains.lock().insert(server.to_str().into_owned(), chain);
    }
}

#[derive(Debug)]
struct RecordingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    chains: Arc<PresentedChains>,
}

impl ServerCertVerifier for RecordingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let verified = self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)?;
        self.chains.record(server_name, end_entity, intermediates);
        Ok(verified)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }

    fn root_hint_subjects(&self) -> Option<&[DistinguishedName]> {
        self.inner.root_hint_subjects()
    }
}

/// Mozilla's root certificates
pub fn default_roots() -> RootCertStore {
    RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    }
}

/// Client configuration verifying servers against `roots` and recording every
/// verified chain into `chains`
pub fn client_config(roots: RootCertStore, chains: Arc<PresentedChains>) -> Result<ClientConfig, AppError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let inner = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone()).build()?;

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(RecordingVerifier { inner, chains }))
        .with_no_client_auth();
    Ok(config)
}

/// Latest `NotAfter` across the given DER-encoded certificates.
///
/// Certificates that fail to parse are skipped.
pub fn furthest_expiry<C: AsRef<[u8]>>(certificates: &[C]) -> Option<DateTime<Utc>> {
    certificates.iter().filter_map(|der| not_after(der.as_ref())).max()
}

/// Time left between `now` and the furthest expiry in the chain
pub fn time_to_expiry<C: AsRef<[u8]>>(certificates: &[C], now: DateTime<Utc>) -> Option<TimeDelta> {
    furthest_expiry(certificates).map(|expiry| expiry - now)
}

fn not_after(der: &[u8]) -> Option<DateTime<Utc>> {
    match X509Certificate::from_der(der) {
        Ok((_, certificate)) => {
            DateTime::from_timestamp(certificate.validity().not_after.timestamp(), 0)
        }
        Err(err) => {
            debug!(error = %err, "skipping unparsable peer certificate");
            None
        }
    }
}
