//! Prometheus metrics derived from probe measurements.

use prometheus::core::Collector;
use prometheus::{GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

use crate::measurement::{Measurement, Observer};

const NAMESPACE: &str = "uptime";
const SUBSYSTEM: &str = "monitor";

/// Per-host gauges and the latency histogram
#[derive(Clone)]
pub struct HostMetrics {
    up: GaugeVec,
    certificate_expiry_days: GaugeVec,
    latency: HistogramVec,
}

impl HostMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let up = GaugeVec::new(
            Opts::new("up", "Whether the host answered with a valid status code")
                .namespace(NAMESPACE)
                .subsystem(SUBSYSTEM),
            &["host"],
        )?;
        let certificate_expiry_days = GaugeVec::new(
            Opts::new(
                "certificate_expiry_days",
                "Days until the furthest certificate presented by the host expires",
            )
            .namespace(NAMESPACE)
            .subsystem(SUBSYSTEM),
            &["host"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new("latency", "Time until the response headers were received, in seconds")
                .namespace(NAMESPACE)
                .subsystem(SUBSYSTEM)
                .buckets(vec![0.25, 0.5, 0.75, 1.0, 2.0, 4.0]),
            &["host", "code"],
        )?;

        Ok(Self {
            up,
            certificate_expiry_days,
            latency,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.up.clone()))?;
        registry.register(Box::new(self.certificate_expiry_days.clone()))?;
        registry.register(Box::new(self.latency.clone()))?;
        Ok(())
    }
}

impl Observer for HostMetrics {
    fn observe(&self, measurement: &Measurement) {
        let host = measurement.host.as_str();

        let up = if measurement.up { 1.0 } else { 0.0 };
        self.up.with_label_values(&[host]).set(up);

        if measurement.is_tls {
            let days = measurement.cert_expiry.num_seconds() as f64 / 86_400.0;
            self.certificate_expiry_days.with_label_values(&[host]).set(days);
        }

        if measurement.status_code > 0 {
            let code = measurement.status_code.to_string();
            self.latency
                .with_label_values(&[host, code.as_str()])
                .observe(measurement.latency.as_secs_f64());
        }
    }

    fn forget(&self, host: &str) {
        let _ = self.up.remove_label_values(&[host]);
        let _ = self.certificate_expiry_days.remove_label_values(&[host]);

        let codes: Vec<String> = self
            .latency
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .filter(|metric| {
                metric
                    .get_label()
                    .iter()
                    .any(|l| l.get_name() == "host" && l.get_value() == host)
            })
            .filter_map(|metric| {
                metric
                    .get_label()
                    .iter()
                    .find(|l| l.get_name() == "code")
                    .map(|l| l.get_value().to_string())
            })
            .collect();
        for code in codes {
            let _ = self.latency.remove_label_values(&[host, code.as_str()]);
        }
    }
}

/// Render every metric in the registry in the text exposition format
pub fn render(registry: &Registry) -> prometheus::Result<(String, Vec<u8>)> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeDelta;

    use super::*;

    fn measurement(host: &str) -> Measurement {
        Measurement::new(host.to_string())
    }

    #[test]
    fn test_up_measurement_sets_gauges() {
        let metrics = HostMetrics::new().unwrap();
        let m = measurement("https://example.com")
            .response(200, Duration::from_millis(300), true)
            .tls(TimeDelta::hours(36));
        metrics.observe(&m);

        assert_eq!(metrics.up.with_label_values(&["https://example.com"]).get(), 1.0);
        assert_eq!(
            metrics.certificate_expiry_days.with_label_values(&["https://example.com"]).get(),
            1.5
        );
        let histogram = metrics.latency.with_label_values(&["https://example.com", "200"]);
        assert_eq!(histogram.get_sample_count(), 1);
        assert!((histogram.get_sample_sum() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_expiry_under_an_hour_is_fractional() {
        let metrics = HostMetrics::new().unwrap();
        let m = measurement("https://example.com")
            .response(200, Duration::from_millis(10), true)
            .tls(TimeDelta::minutes(36));
        metrics.observe(&m);

        let days = metrics.certificate_expiry_days.with_label_values(&["https://example.com"]).get();
        assert!((days - 0.025).abs() < 1e-9);

        metrics.observe(&m.clone().tls(TimeDelta::minutes(-90)));
        let days = metrics.certificate_expiry_days.with_label_values(&["https://example.com"]).get();
        assert!((days + 0.0625).abs() < 1e-9);
    }

    #[test]
    fn test_failed_measurement_only_sets_up() {
        let metrics = HostMetrics::new().unwrap();
        let registry = Registry::new();
        metrics.register(&registry).unwrap();

        metrics.observe(&measurement("example.com"));

        let (_, body) = render(&registry).unwrap();
        let body = String::from_utf8(body).unwrap();
        assert!(body.contains(r#"uptime_monitor_up{host="example.com"} 0"#));
        assert!(!body.contains("uptime_monitor_certificate_expiry_days{"));
        assert!(!body.contains("uptime_monitor_latency_bucket{"));
    }

    #[test]
    fn test_forget_drops_host_series() {
        let metrics = HostMetrics::new().unwrap();
        let registry = Registry::new();
        metrics.register(&registry).unwrap();

        for code in [200, 503] {
            let m = measurement("a.example.com")
                .response(code, Duration::from_millis(10), code == 200)
                .tls(TimeDelta::days(30));
            metrics.observe(&m);
        }
        metrics.observe(&measurement("b.example.com").response(200, Duration::from_millis(10), true));

        metrics.forget("a.example.com");

        let (_, body) = render(&registry).unwrap();
        let body = String::from_utf8(body).unwrap();
        assert!(!body.contains("a.example.com"));
        assert!(body.contains(r#"uptime_monitor_up{host="b.example.com"} 1"#));
        assert!(body.lines().any(|line| line.starts_with("uptime_monitor_latency_count{")
            && line.contains(r#"host="b.example.com""#)
            && line.ends_with(" 1")));
    }
}
