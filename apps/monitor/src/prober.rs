use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use reqwest::Method;
use reqwest::tls::TlsInfo;
use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uptime_wire::ProbeRequest;

use crate::error::AppError;
use crate::measurement::{Measurement, Observer};
use crate::tls::{self, PresentedChains};

/// Periodically checks a single target and publishes each measurement.
pub struct Prober {
    request: ProbeRequest,
    client: ProbeClient,
    observer: Arc<dyn Observer>,
    cancel: CancellationToken,
    publishing: Arc<Mutex<()>>,
}

impl Prober {
    pub fn new(
        request: ProbeRequest,
        client: ProbeClient,
        observer: Arc<dyn Observer>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            request,
            client,
            observer,
            cancel,
            publishing: Arc::default(),
        }
    }

    /// Held while a measurement is published. Cancelling under this lock
    /// guarantees nothing is observed afterwards.
    pub fn publishing(&self) -> Arc<Mutex<()>> {
        self.publishing.clone()
    }

    pub fn request(&self) -> &ProbeRequest {
        &self.request
    }

    /// Probe immediately, then once per interval until cancelled.
    ///
    /// A measurement that completes after cancellation is dropped.
    pub async fn run(self) {
        let host = self.request.target.as_str();
        debug!(host, "prober started");

        loop {
            let measurement = self.probe().await;
            {
                let _publishing = self.publishing.lock();
                if self.cancel.is_cancelled() {
                    break;
                }
                self.observer.observe(&measurement);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.request.interval) => {}
            }
        }

        debug!(host, "prober stopped");
    }

    /// Issue one request against the target
    pub async fn probe(&self) -> Measurement {
        let host = self.request.target.as_str();
        let measurement = Measurement::new(host.to_string());

        let method = match Method::from_bytes(self.request.method.as_bytes()) {
            Ok(method) => method,
            Err(err) => {
                debug!(host, method = %self.request.method, error = %err, "invalid method");
                return measurement;
            }
        };

        let start = Instant::now();
        let response = match self.client.http.request(method, probe_url(host)).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(host, error = %err, "measurement failed");
                return measurement;
            }
        };
        let latency = start.elapsed();

        let status = response.status().as_u16();
        let mut measurement = measurement.response(status, latency, self.request.is_valid_code(status));

        if let Some(leaf) = response.extensions().get::<TlsInfo>().and_then(TlsInfo::peer_certificate) {
            let now = Utc::now();
            let expiry = match self.client.presented_chain(response.url()) {
                Some(chain) => tls::time_to_expiry(&chain, now),
                None => tls::time_to_expiry(&[leaf], now),
            };
            measurement = measurement.tls(expiry.unwrap_or_else(TimeDelta::zero));
        }

        debug!(host, status, latency = ?latency, up = measurement.up, "measurement done");
        measurement
    }
}

/// URL to request for a target, assuming HTTPS when no scheme is given
pub fn probe_url(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("https://{target}")
    }
}

/// HTTP client shared by all probers.
///
/// The client never follows redirects so 3xx codes reach the valid code check,
/// and remembers the certificate chain every TLS server presented.
#[derive(Clone)]
pub struct ProbeClient {
    http: reqwest::Client,
    chains: Arc<PresentedChains>,
}

impl ProbeClient {
    /// Client trusting Mozilla's root certificates
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        Self::with_roots(timeout, tls::default_roots())
    }

    pub fn with_roots(timeout: Duration, roots: RootCertStore) -> Result<Self, AppError> {
        let chains = Arc::new(PresentedChains::default());
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .tls_info(true)
            .use_preconfigured_tls(tls::client_config(roots, chains.clone())?)
            .build()?;

        Ok(Self { http, chains })
    }

    /// Chain the server behind `url` presented on its last handshake
    fn presented_chain(&self, url: &reqwest::Url) -> Option<Vec<CertificateDer<'static>>> {
        let server = url.host_str()?.trim_start_matches('[').trim_end_matches(']');
        self.chains.get(server)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use parking_lot::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        measurements: Mutex<Vec<Measurement>>,
    }

    impl Observer for Recorder {
        fn observe(&self, measurement: &Measurement) {
            self.measurements.lock().push(measurement.clone());
        }
    }

    fn request(target: &str, method: &str, codes: &[u16]) -> ProbeRequest {
        ProbeRequest {
            target: target.to_string(),
            method: method.to_string(),
            valid_codes: codes.iter().copied().collect::<BTreeSet<_>>(),
            interval: Duration::from_secs(3600),
        }
    }

    fn prober(request: ProbeRequest, observer: Arc<Recorder>) -> Prober {
        let client = ProbeClient::new(Duration::from_secs(5)).unwrap();
        Prober::new(request, client, observer, CancellationToken::new())
    }

    #[test]
    fn test_probe_url() {
        assert_eq!(probe_url("example.com"), "https://example.com");
        assert_eq!(probe_url("https://example.com"), "https://example.com");
        assert_eq!(probe_url("http://localhost:8080/health"), "http://localhost:8080/health");
    }

    #[tokio::test]
    async fn test_probe_valid_code_is_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let prober = prober(request(&server.uri(), "GET", &[200]), Arc::default());
        let measurement = prober.probe().await;

        assert!(measurement.up);
        assert_eq!(measurement.status_code, 200);
        assert_eq!(measurement.host, server.uri());
        assert!(!measurement.is_tls);
    }

    #[tokio::test]
    async fn test_probe_other_code_is_down() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let prober = prober(request(&server.uri(), "HEAD", &[200, 204]), Arc::default());
        let measurement = prober.probe().await;

        assert!(!measurement.up);
        assert_eq!(measurement.status_code, 403);
    }

    #[tokio::test]
    async fn test_probe_redirect_is_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/elsewhere"))
            .mount(&server)
            .await;

        let prober = prober(request(&server.uri(), "GET", &[301]), Arc::default());
        let measurement = prober.probe().await;

        assert!(measurement.up);
        assert_eq!(measurement.status_code, 301);
    }

    #[tokio::test]
    async fn test_probe_transport_error_is_down() {
        let prober = prober(request("http://127.0.0.1:1", "GET", &[200]), Arc::default());
        let measurement = prober.probe().await;

        assert_eq!(measurement, Measurement::new("http://127.0.0.1:1".into()));
    }

    #[tokio::test]
    async fn test_run_publishes_until_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();
        let mut request = request(&server.uri(), "GET", &[200]);
        request.interval = Duration::from_millis(20);

        let client = ProbeClient::new(Duration::from_secs(5)).unwrap();
        let handle = tokio::spawn(Prober::new(request, client, recorder.clone(), cancel.clone()).run());

        tokio::time::timeout(Duration::from_secs(5), async {
            while recorder.measurements.lock().len() < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("prober should publish repeatedly");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("prober should stop")
            .unwrap();

        let published = recorder.measurements.lock().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.measurements.lock().len(), published);
        assert!(recorder.measurements.lock().iter().all(|m| m.up));
    }
}
