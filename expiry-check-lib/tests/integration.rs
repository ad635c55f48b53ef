// expiry-check-lib/tests/integration.rs

//! Integration tests for the dispatcher and the certificate probe against a
//! local TLS server.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use expiry_check_lib::probes::certificate::leaf_not_after;
use expiry_check_lib::{
    CertificateExpiryProbe, ChannelReporter, CheckMode, CollectingReporter,
    ExpiryCheckError, ExpiryProbe, InputPolicy, ProbeOutcome, RustlsHandshaker, StopReason,
    TlsHandshake, WorkDispatcher,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{RootCertStore, ServerConfig};
use std::collections::HashSet;
use std::io::BufReader as StdBufReader;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

const EXPIRED_CERT: &[u8] = include_bytes!("fixtures/expired.pem");
const EXPIRED_KEY: &[u8] = include_bytes!("fixtures/expired.key");

/// Probe that tracks how many calls overlap and which hosts it saw.
#[derive(Default)]
struct InstrumentedProbe {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    hosts: Mutex<Vec<String>>,
}

#[async_trait]
impl ExpiryProbe for InstrumentedProbe {
    fn mode(&self) -> CheckMode {
        CheckMode::Registration
    }

    async fn days_remaining(&self, domain: &str) -> Result<i64, ExpiryCheckError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hosts.lock().unwrap().push(domain.to_string());

        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match domain {
            "boom.com" => panic!("probe exploded"),
            "missing.com" => Err(ExpiryCheckError::not_registered(domain)),
            _ => Ok(domain.len() as i64),
        }
    }
}

async fn run_lines(
    input: &str,
    budget: usize,
    policy: InputPolicy,
) -> (
    Arc<InstrumentedProbe>,
    Arc<CollectingReporter>,
    expiry_check_lib::DispatchSummary,
) {
    let probe = Arc::new(InstrumentedProbe::default());
    let reporter = Arc::new(CollectingReporter::new());
    let summary = WorkDispatcher::new(probe.clone(), reporter.clone(), budget)
        .unwrap()
        .with_input_policy(policy)
        .run(input.as_bytes())
        .await
        .unwrap();
    (probe, reporter, summary)
}

fn outcomes(reporter: &CollectingReporter) -> Vec<(String, ProbeOutcome)> {
    let mut outcomes: Vec<_> = reporter
        .results()
        .into_iter()
        .map(|r| (r.domain, r.outcome))
        .collect();
    outcomes.sort_by(|a, b| a.0.cmp(&b.0));
    outcomes
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_budget() {
    let input: String = (0..20).map(|i| format!("host{}.com\n", i)).collect();
    let (probe, reporter, summary) = run_lines(&input, 3, InputPolicy::default()).await;

    assert_eq!(summary.scheduled, 20);
    assert_eq!(summary.stop_reason, StopReason::EndOfInput);
    assert_eq!(reporter.len(), 20);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 20);
    assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_large_budget_is_accepted() {
    let input: String = (0..200).map(|i| format!("host{}.com\n", i)).collect();
    let (probe, reporter, summary) = run_lines(&input, 150, InputPolicy::default()).await;

    assert_eq!(summary.scheduled, 200);
    assert_eq!(reporter.len(), 200);
    let max = probe.max_in_flight.load(Ordering::SeqCst);
    assert!(max > 100 && max <= 150, "max in flight was {}", max);
}

#[test]
fn test_release_profile_unwinds_on_panic() {
    let manifest: toml::Table = toml::from_str(include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../Cargo.toml"
    )))
    .unwrap();
    let panic = manifest
        .get("profile")
        .and_then(|profile| profile.get("release"))
        .and_then(|release| release.get("panic"))
        .and_then(|value| value.as_str());
    assert!(
        matches!(panic, None | Some("unwind")),
        "release profile must unwind so a panicking probe becomes a failed result"
    );
}

#[tokio::test]
async fn test_blank_line_truncates_input() {
    let (probe, reporter, summary) =
        run_lines("a.com\nb.com\n\nc.com\n", 4, InputPolicy::default()).await;

    assert_eq!(summary.scheduled, 2);
    assert_eq!(summary.lines_read, 3);
    assert_eq!(summary.stop_reason, StopReason::BlankLine { line: 3 });
    assert_eq!(reporter.len(), 2);
    assert!(!probe.hosts.lock().unwrap().contains(&"c.com".to_string()));
}

#[tokio::test]
async fn test_malformed_line_truncates_input() {
    let (_, reporter, summary) =
        run_lines("a.com\nnot_a_domain\nc.com\n", 2, InputPolicy::default()).await;

    assert_eq!(summary.scheduled, 1);
    assert_eq!(
        summary.stop_reason,
        StopReason::MalformedEntry {
            line: 2,
            entry: "not_a_domain".to_string()
        }
    );
    assert_eq!(reporter.len(), 1);
}

#[tokio::test]
async fn test_skip_policy_keeps_reading() {
    let (_, reporter, summary) = run_lines(
        "a.com\n\nnot_a_domain\nc.com\n",
        2,
        InputPolicy::SkipAnomalies,
    )
    .await;

    assert_eq!(summary.scheduled, 2);
    assert_eq!(summary.skipped.len(), 2);
    assert_eq!(summary.stop_reason, StopReason::EndOfInput);
    let domains: Vec<_> = outcomes(&reporter).into_iter().map(|(d, _)| d).collect();
    assert_eq!(domains, vec!["a.com", "c.com"]);
}

#[tokio::test]
async fn test_duplicates_are_probed_independently() {
    let (probe, reporter, summary) =
        run_lines("a.com\na.com\na.com\n", 2, InputPolicy::default()).await;

    assert_eq!(summary.scheduled, 3);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    assert_eq!(reporter.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sequential_budget_gives_same_results() {
    let input = "a.com\nmissing.com\nexample.org\nwww.example.co.uk\n";
    let (seq_probe, sequential, _) = run_lines(input, 1, InputPolicy::default()).await;
    let (_, parallel, _) = run_lines(input, 4, InputPolicy::default()).await;

    assert_eq!(seq_probe.max_in_flight.load(Ordering::SeqCst), 1);
    let sequential = outcomes(&sequential);
    let parallel = outcomes(&parallel);
    assert_eq!(sequential.len(), 4);
    for ((d1, o1), (d2, o2)) in sequential.iter().zip(parallel.iter()) {
        assert_eq!(d1, d2);
        assert_eq!(o1.days_remaining(), o2.days_remaining());
        assert_eq!(
            o1.error().map(|e| e.kind()),
            o2.error().map(|e| e.kind())
        );
    }
}

#[tokio::test]
async fn test_probe_failures_do_not_stop_dispatch() {
    let (_, reporter, summary) =
        run_lines("missing.com\nboom.com\nok.com\n", 2, InputPolicy::default()).await;

    assert_eq!(summary.scheduled, 3);
    let outcomes = outcomes(&reporter);
    assert!(matches!(
        outcomes[0].1.error(),
        Some(ExpiryCheckError::Internal { .. })
    ));
    assert!(matches!(
        outcomes[1].1.error(),
        Some(ExpiryCheckError::NotRegistered { .. })
    ));
    assert_eq!(outcomes[2].1.days_remaining(), Some(6));
}

#[tokio::test]
async fn test_url_entries_probe_bare_host() {
    let (probe, reporter, _) =
        run_lines("https://a.com/\nhttp://b.com\n", 2, InputPolicy::default()).await;

    let hosts: HashSet<_> = probe.hosts.lock().unwrap().iter().cloned().collect();
    assert_eq!(hosts, HashSet::from(["a.com".to_string(), "b.com".to_string()]));

    let domains: Vec<_> = outcomes(&reporter).into_iter().map(|(d, _)| d).collect();
    assert_eq!(domains, vec!["http://b.com", "https://a.com/"]);
}

#[tokio::test]
async fn test_empty_input_finishes_immediately() {
    let (probe, reporter, summary) = run_lines("", 3, InputPolicy::default()).await;
    assert_eq!(summary.scheduled, 0);
    assert_eq!(summary.stop_reason, StopReason::EndOfInput);
    assert!(reporter.is_empty());
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_zero_budget_is_rejected() {
    let result = WorkDispatcher::new(
        Arc::new(InstrumentedProbe::default()),
        Arc::new(CollectingReporter::new()),
        0,
    );
    assert!(matches!(result, Err(ExpiryCheckError::ConfigError { .. })));
}

#[tokio::test]
async fn test_read_error_drains_then_fails() {
    let source = tokio_test::io::Builder::new()
        .read(b"a.com\n")
        .read_error(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "input went away",
        ))
        .build();

    let probe = Arc::new(InstrumentedProbe::default());
    let reporter = Arc::new(CollectingReporter::new());
    let result = WorkDispatcher::new(probe.clone(), reporter.clone(), 2)
        .unwrap()
        .run(BufReader::new(source))
        .await;

    assert!(matches!(result, Err(ExpiryCheckError::FileError { .. })));
    // the unit launched before the failure still reported
    assert_eq!(reporter.len(), 1);
}

#[tokio::test]
async fn test_channel_reporter_stream_ends_after_run() {
    let (reporter, mut receiver) = ChannelReporter::channel();
    let probe = Arc::new(InstrumentedProbe::default());
    let dispatch = tokio::spawn(
        WorkDispatcher::new(probe, Arc::new(reporter), 2)
            .unwrap()
            .run(&b"a.com\nb.com\nc.com\n"[..]),
    );

    let mut received = 0;
    while let Some(result) = receiver.recv().await {
        assert_eq!(result.mode, CheckMode::Registration);
        assert!(result.check_duration.is_some());
        received += 1;
    }

    assert_eq!(received, 3);
    assert_eq!(dispatch.await.unwrap().unwrap().scheduled, 3);
}

fn load_fixture() -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
    let certs = rustls_pemfile::certs(&mut StdBufReader::new(EXPIRED_CERT))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut StdBufReader::new(EXPIRED_KEY))
        .unwrap()
        .unwrap();
    (certs, key)
}

/// Serve the expired fixture certificate on a local port.
async fn spawn_tls_server() -> (u16, tokio::task::JoinHandle<()>) {
    let (certs, key) = load_fixture();
    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // handshake failures are expected in the verifying test
                let _ = acceptor.accept(socket).await;
            });
        }
    });

    (port, server)
}

#[test]
fn test_fixture_not_after() {
    let (certs, _) = load_fixture();
    let not_after = leaf_not_after("localhost", &certs).unwrap();
    assert_eq!(not_after, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
}

#[tokio::test]
async fn test_expired_certificate_reports_negative_days() {
    let (port, server) = spawn_tls_server().await;

    let probe = CertificateExpiryProbe::new(RustlsHandshaker::new())
        .with_port(port)
        .with_timeout(Duration::from_secs(5));
    let days = probe.days_remaining("127.0.0.1").await.unwrap();

    let expected = (Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap() - Utc::now()).num_days();
    assert!(days < -1000);
    assert!((days - expected).abs() <= 1);

    server.abort();
}

#[tokio::test]
async fn test_verifying_handshake_rejects_expired_certificate() {
    let (port, server) = spawn_tls_server().await;
    let (certs, _) = load_fixture();

    let mut roots = RootCertStore::empty();
    roots.add_parsable_certificates(certs);
    let handshaker = RustlsHandshaker::new().with_root_certificates(roots);

    let err = handshaker
        .handshake("localhost", port, Duration::from_secs(5), false)
        .await
        .unwrap_err();
    assert!(matches!(err, ExpiryCheckError::ConnectionError { .. }));

    server.abort();
}

#[tokio::test]
async fn test_skip_verify_handshake_returns_leaf_first() {
    let (port, server) = spawn_tls_server().await;
    let (certs, _) = load_fixture();

    let chain = RustlsHandshaker::new()
        .handshake("127.0.0.1", port, Duration::from_secs(5), true)
        .await
        .unwrap();
    assert_eq!(chain.first(), certs.first());

    server.abort();
}
