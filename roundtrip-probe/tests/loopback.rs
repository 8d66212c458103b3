//! A probe sent through the crate's own SMTP listener comes back to the
//! correlator and shows up in the report.

use std::{net::IpAddr, sync::Arc, time::Duration};

use roundtrip_common::{Signal, config::ClientTimeouts};
use roundtrip_probe::{
    Correlator, Emitter, ProbeConfig, ProbeState, Received, Reporter, RowClass, SmtpTransport,
    StaticResolver, SystemClock,
};
use roundtrip_smtp::{Listener, SmtpConfig};
use tokio::sync::broadcast;

const ADDRESS: &str = "roundtrip@loopback.test";

#[tokio::test]
async fn probe_round_trip_through_own_listener() {
    let state = Arc::new(ProbeState::new(100, Arc::new(SystemClock)));

    let correlator = Arc::new(Correlator::new(state.clone(), ADDRESS.to_string()));
    let smtp = SmtpConfig {
        listen_address: "127.0.0.1:0".parse().unwrap(),
        banner: Some("loopback.test".to_string()),
        ..SmtpConfig::default()
    };
    let listener = Listener::bind(&smtp, correlator).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (shutdown, receiver) = broadcast::channel(4);
    let server = tokio::spawn(listener.serve(receiver));

    let config = ProbeConfig {
        target: ADDRESS.to_string(),
        accept_address: ADDRESS.to_string(),
        mx_override: Some("127.0.0.1".to_string()),
        smtp_port: port,
        ..ProbeConfig::default()
    };
    let transport = Arc::new(SmtpTransport::new(
        "client.loopback.test".to_string(),
        ClientTimeouts::default(),
        Duration::from_secs(10),
    ));
    let emitter = Emitter::new(
        state.clone(),
        Arc::new(StaticResolver::new()),
        transport,
        config,
    );

    let record = emitter.tick().await;
    assert_eq!(record.error, None);
    assert!(record.is_completed(), "{record:?}");
    assert_eq!(record.via_mx.as_deref(), Some("127.0.0.1"));
    assert_eq!(record.receiving_peer.as_deref(), Some("127.0.0.1"));
    assert!(record.duration.is_some_and(|duration| (0.0..5.0).contains(&duration)));

    let localhost: IpAddr = "127.0.0.1".parse().unwrap();
    let reporter = Reporter::new(
        state.clone(),
        Arc::new(StaticResolver::new().with_ptr(localhost, "localhost")),
        25.0,
        30,
    );
    assert!(reporter.liveness() <= 1);

    let report = reporter.detailed().await;
    assert_eq!(report.rows.len(), 1);
    let row = &report.rows[0];
    assert_eq!(row.id, record.id);
    assert_eq!(row.class, RowClass::Good);
    assert!(matches!(row.received, Received::At(_)));
    assert!(row.how_long_ago.ends_with("(via localhost [127.0.0.1])"));
    assert!(report.average.is_some());

    shutdown.send(Signal::Shutdown).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn unreachable_exchanger_is_recorded() {
    let state = Arc::new(ProbeState::new(100, Arc::new(SystemClock)));

    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = closed.local_addr().unwrap().port();
    drop(closed);

    let emitter = Emitter::new(
        state.clone(),
        Arc::new(StaticResolver::new()),
        Arc::new(SmtpTransport::new(
            "client.loopback.test".to_string(),
            ClientTimeouts::default(),
            Duration::from_secs(5),
        )),
        ProbeConfig {
            mx_override: Some("127.0.0.1".to_string()),
            smtp_port: port,
            ..ProbeConfig::default()
        },
    );

    let record = emitter.tick().await;
    assert!(record.is_failed());
    assert!(!record.is_completed());
    assert!(
        record
            .error
            .as_deref()
            .is_some_and(|error| error.starts_with("Failed to connect to 127.0.0.1:"))
    );
    assert_eq!(state.snapshot_recent(1), vec![record]);
}
