//! Read-only views over the probe history.

use std::{
    collections::{HashMap, HashSet},
    net::IpAddr,
    sync::Arc,
    time::Duration,
};

use chrono::DateTime;
use futures_util::future::join_all;
use serde::Serialize;

use crate::{dns::PeerResolver, record::ProbeRecord, state::ProbeState};

/// Rows shown on the detail page.
pub const DEFAULT_DETAIL_ROWS: usize = 30;

/// Longest a single reverse lookup may hold up the detail view.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Shown where the exchanger is unknown.
pub const UNKNOWN_EXCHANGER: &str = "???";

/// How a probe is doing, used as the row's CSS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowClass {
    /// Back within the expected delivery time
    Good,
    /// Back, but slower than expected
    Slow,
    /// Not back yet, still within the expected delivery time
    Pending,
    /// Not back and overdue
    Noshow,
}

/// The received column of a detail row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Received {
    /// Formatted receive time
    At(String),
    NotYet,
    /// Dispatch error text, unescaped
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailRow {
    pub id: String,
    pub via: String,
    pub how_long_ago: String,
    pub sent: String,
    pub received: Received,
    /// Seconds with two decimals, `None` until the probe is back
    pub duration: Option<String>,
    pub class: RowClass,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailReport {
    /// Newest first
    pub rows: Vec<DetailRow>,
    /// Mean round trip of the completed rows, `None` if there are none
    pub average: Option<f64>,
}

impl DetailReport {
    /// The average with two decimals, `0` when there is no data.
    pub fn average_display(&self) -> String {
        self.average
            .map_or_else(|| "0".to_string(), |average| format!("{average:.2}"))
    }
}

/// Builds the liveness and detail views.
pub struct Reporter {
    state: Arc<ProbeState>,
    peers: Arc<dyn PeerResolver>,
    expected_delivery: f64,
    rows: usize,
    lookup_timeout: Duration,
}

impl Reporter {
    pub fn new(
        state: Arc<ProbeState>,
        peers: Arc<dyn PeerResolver>,
        expected_delivery: f64,
        rows: usize,
    ) -> Self {
        Self {
            state,
            peers,
            expected_delivery,
            rows,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Bound each reverse lookup. Lookups run concurrently, so this also
    /// bounds the whole detail view.
    #[must_use]
    pub const fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }

    /// Whole seconds since mail for us was last received.
    pub fn liveness(&self) -> u64 {
        self.state.seconds_since_last_received()
    }

    /// The most recent probes, newest first.
    ///
    /// Works on a snapshot, so reverse lookups never hold up the emitter or
    /// the correlator.
    pub async fn detailed(&self) -> DetailReport {
        let records = self.state.snapshot_recent(self.rows);
        let now = self.state.now();

        let peers: HashSet<&str> = records
            .iter()
            .filter_map(|record| record.receiving_peer.as_deref())
            .collect();
        let names: HashMap<String, String> = join_all(
            peers
                .into_iter()
                .map(|peer| async move { (peer.to_string(), self.peer_name(peer).await) }),
        )
        .await
        .into_iter()
        .collect();

        let rows = records
            .iter()
            .rev()
            .map(|record| self.row(record, now, &names))
            .collect();

        DetailReport {
            rows,
            average: average_duration(&records),
        }
    }

    /// Reverse DNS name of `peer`, or `peer` itself when that fails.
    async fn peer_name(&self, peer: &str) -> String {
        let Ok(ip) = peer.parse::<IpAddr>() else {
            return peer.to_string();
        };

        match tokio::time::timeout(self.lookup_timeout, self.peers.reverse(ip)).await {
            Ok(Ok(name)) => name,
            Ok(Err(err)) => {
                tracing::debug!(%peer, error = %err, "Reverse lookup failed");
                peer.to_string()
            }
            Err(_) => {
                tracing::debug!(%peer, timeout = ?self.lookup_timeout, "Reverse lookup timed out");
                peer.to_string()
            }
        }
    }

    fn row(&self, record: &ProbeRecord, now: f64, names: &HashMap<String, String>) -> DetailRow {
        let (class, how_long_ago, received, duration) =
            match (record.received_at, record.duration) {
                (Some(received_at), Some(duration)) => {
                    let peer = record.receiving_peer.as_deref().unwrap_or_default();
                    let name = names.get(peer).map_or(peer, String::as_str);
                    let class = if duration > self.expected_delivery {
                        RowClass::Slow
                    } else {
                        RowClass::Good
                    };

                    (
                        class,
                        format!("{} (via {name} [{peer}])", ago(now, received_at)),
                        Received::At(format_time(received_at)),
                        Some(format!("{duration:.2}")),
                    )
                }
                _ if record.is_sending() => (
                    RowClass::Pending,
                    "Still being sent".to_string(),
                    Received::NotYet,
                    None,
                ),
                _ => {
                    #[allow(clippy::cast_precision_loss, reason = "Unix seconds are exact in an f64")]
                    let waited = now - record.sent_at as f64;
                    let class = if waited > self.expected_delivery {
                        RowClass::Noshow
                    } else {
                        RowClass::Pending
                    };

                    (class, "Not received yet".to_string(), Received::NotYet, None)
                }
            };

        let received = record
            .error
            .as_ref()
            .map_or(received, |error| Received::Failed(error.clone()));

        DetailRow {
            id: record.id.clone(),
            via: record
                .via_mx
                .clone()
                .unwrap_or_else(|| UNKNOWN_EXCHANGER.to_string()),
            how_long_ago,
            sent: format_time(record.sent_at),
            received,
            duration,
            class,
        }
    }
}

/// Mean duration of the completed records.
pub fn average_duration(records: &[ProbeRecord]) -> Option<f64> {
    let durations: Vec<f64> = records
        .iter()
        .filter(|record| record.is_completed())
        .filter_map(|record| record.duration)
        .collect();

    if durations.is_empty() {
        return None;
    }

    #[allow(clippy::cast_precision_loss, reason = "At most a few thousand rows")]
    let count = durations.len() as f64;
    Some(durations.iter().sum::<f64>() / count)
}

/// `HHh:MMm:SSs ago` for the time between `then` and `now`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "Clamped to zero and truncated to whole seconds"
)]
fn ago(now: f64, then: i64) -> String {
    let elapsed = (now - then as f64).max(0.0) as u64;
    format!(
        "{:02}h:{:02}m:{:02}s ago",
        elapsed / 3600,
        (elapsed / 60) % 60,
        elapsed % 60
    )
}

/// `%Y-%m-%d %H:%M:%S UTC`
fn format_time(unix: i64) -> String {
    DateTime::from_timestamp(unix, 0).map_or_else(
        || unix.to_string(),
        |time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{clock::ManualClock, dns::StaticResolver};

    fn reporter_at(now: f64, resolver: StaticResolver) -> (Reporter, Arc<ProbeState>) {
        let state = Arc::new(ProbeState::new(100, Arc::new(ManualClock::new(now))));
        (
            Reporter::new(state.clone(), Arc::new(resolver), 25.0, DEFAULT_DETAIL_ROWS),
            state,
        )
    }

    fn completed(id: &str, sent_at: i64, duration: f64, peer: &str) -> ProbeRecord {
        let mut record =
            ProbeRecord::pending(id.to_string(), sent_at, Some("mx.example.net".to_string()));
        let received_at = sent_at + duration.trunc() as i64;
        record.mark_completed(received_at, duration, peer.to_string());
        record
    }

    #[tokio::test]
    async fn completed_row_shape() {
        let peer: IpAddr = "192.0.2.25".parse().unwrap();
        let (reporter, state) = reporter_at(
            1_700_003_732.0,
            StaticResolver::new().with_ptr(peer, "relay.example.net"),
        );
        state.append(completed("a", 1_700_000_000, 7.25, "192.0.2.25"));

        let report = reporter.detailed().await;
        assert_eq!(
            report.rows,
            vec![DetailRow {
                id: "a".to_string(),
                via: "mx.example.net".to_string(),
                how_long_ago: "01h:02m:05s ago (via relay.example.net [192.0.2.25])".to_string(),
                sent: "2023-11-14 22:13:20 UTC".to_string(),
                received: Received::At("2023-11-14 22:13:27 UTC".to_string()),
                duration: Some("7.25".to_string()),
                class: RowClass::Good,
            }]
        );
        assert_eq!(report.average_display(), "7.25");
    }

    #[tokio::test]
    async fn slow_and_good_against_threshold() {
        let (reporter, state) = reporter_at(2000.0, StaticResolver::new());
        state.append(completed("fast", 1000, 25.0, "192.0.2.1"));
        state.append(completed("slow", 1000, 25.001, "192.0.2.1"));

        let report = reporter.detailed().await;
        assert_eq!(report.rows[0].id, "slow");
        assert_eq!(report.rows[0].class, RowClass::Slow);
        assert_eq!(report.rows[1].class, RowClass::Good);
    }

    #[tokio::test]
    async fn reverse_lookup_failure_falls_back_to_address() {
        let (reporter, state) = reporter_at(1010.0, StaticResolver::new());
        state.append(completed("a", 1000, 2.0, "192.0.2.1"));
        state.append(completed("b", 1000, 2.0, "not-an-ip"));

        let report = reporter.detailed().await;
        assert!(report.rows[0].how_long_ago.ends_with("(via not-an-ip [not-an-ip])"));
        assert!(report.rows[1].how_long_ago.ends_with("(via 192.0.2.1 [192.0.2.1])"));
    }

    #[tokio::test]
    async fn pending_becomes_noshow_strictly_after_threshold() {
        let (reporter, state) = reporter_at(1025.0, StaticResolver::new());
        state.append(ProbeRecord::pending("p".to_string(), 1000, None));

        let row = &reporter.detailed().await.rows[0];
        assert_eq!(row.class, RowClass::Pending);
        assert_eq!(row.how_long_ago, "Not received yet");
        assert_eq!(row.received, Received::NotYet);
        assert_eq!(row.duration, None);
        assert_eq!(row.via, UNKNOWN_EXCHANGER);

        let (reporter, state) = reporter_at(1025.0001, StaticResolver::new());
        state.append(ProbeRecord::pending("p".to_string(), 1000, None));
        assert_eq!(reporter.detailed().await.rows[0].class, RowClass::Noshow);
    }

    #[tokio::test]
    async fn dispatch_error_replaces_received_column() {
        let (reporter, state) = reporter_at(1010.0, StaticResolver::new());
        state.append(ProbeRecord::failed(
            "f".to_string(),
            1000,
            None,
            "MX lookup failed: <boom>".to_string(),
        ));

        let row = &reporter.detailed().await.rows[0];
        assert_eq!(row.received, Received::Failed("MX lookup failed: <boom>".to_string()));
        assert_eq!(row.class, RowClass::Pending);
        assert_eq!(row.via, "???");
    }

    #[tokio::test]
    async fn record_still_being_sent_is_not_overdue() {
        let (reporter, state) = reporter_at(1027.0, StaticResolver::new());
        state.append(ProbeRecord::sending(
            "s".to_string(),
            1000,
            Some("mx.example.net".to_string()),
        ));

        let row = &reporter.detailed().await.rows[0];
        assert_eq!(row.class, RowClass::Pending);
        assert_eq!(row.how_long_ago, "Still being sent");
        assert_eq!(row.received, Received::NotYet);

        state.set_error("s", "Probe send timed out after 30s".to_string());
        let row = &reporter.detailed().await.rows[0];
        assert_eq!(row.class, RowClass::Noshow);
        assert_eq!(
            row.received,
            Received::Failed("Probe send timed out after 30s".to_string())
        );
    }

    /// Answers `fast` at once, everything else only after four seconds.
    struct Sluggish {
        fast: IpAddr,
    }

    #[async_trait::async_trait]
    impl PeerResolver for Sluggish {
        async fn reverse(&self, ip: IpAddr) -> Result<String, crate::dns::DnsError> {
            if ip == self.fast {
                return Ok("fast.example.net".to_string());
            }
            tokio::time::sleep(Duration::from_secs(4)).await;
            Err(crate::dns::DnsError::NoPtr(ip))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reverse_lookups_are_concurrent_and_bounded() {
        let fast: IpAddr = "192.0.2.1".parse().unwrap();
        let state = Arc::new(ProbeState::new(100, Arc::new(ManualClock::new(2000.0))));
        let reporter = Reporter::new(state.clone(), Arc::new(Sluggish { fast }), 25.0, 30)
            .with_lookup_timeout(Duration::from_secs(3));

        state.append(completed("a", 1000, 2.0, "192.0.2.1"));
        state.append(completed("b", 1000, 2.0, "192.0.2.2"));
        state.append(completed("c", 1000, 2.0, "192.0.2.3"));
        state.append(completed("d", 1000, 2.0, "192.0.2.4"));

        let started = tokio::time::Instant::now();
        let report = reporter.detailed().await;
        assert!(started.elapsed() < Duration::from_secs(4));

        assert_eq!(report.rows.len(), 4);
        assert!(report.rows[3].how_long_ago.ends_with("(via fast.example.net [192.0.2.1])"));
        assert!(report.rows[2].how_long_ago.ends_with("(via 192.0.2.2 [192.0.2.2])"));
        assert!(report.rows[1].how_long_ago.ends_with("(via 192.0.2.3 [192.0.2.3])"));
        assert!(report.rows[0].how_long_ago.ends_with("(via 192.0.2.4 [192.0.2.4])"));
    }

    #[tokio::test]
    async fn window_is_newest_first_and_bounded() {
        let (reporter, state) = reporter_at(5000.0, StaticResolver::new());
        for n in 0..40 {
            state.append(ProbeRecord::pending(format!("p{n}"), 1000 + n, None));
        }

        let report = reporter.detailed().await;
        assert_eq!(report.rows.len(), DEFAULT_DETAIL_ROWS);
        assert_eq!(report.rows[0].id, "p39");
        assert_eq!(report.rows[29].id, "p10");
        assert_eq!(report.average, None);
        assert_eq!(report.average_display(), "0");
    }

    #[test]
    fn average_over_completed_rows_only() {
        let records = vec![
            completed("a", 1000, 2.0, "192.0.2.1"),
            ProbeRecord::pending("b".to_string(), 1000, None),
            completed("c", 1000, 4.5, "192.0.2.1"),
        ];
        let average = average_duration(&records).expect("average");
        assert!((average - 3.25).abs() < 1e-9);

        assert_eq!(average_duration(&[ProbeRecord::pending("x".to_string(), 1, None)]), None);
        assert_eq!(average_duration(&[]), None);
    }

    #[test]
    fn liveness_reads_state() {
        let (reporter, _state) = reporter_at(1000.0, StaticResolver::new());
        assert_eq!(reporter.liveness(), 0);
    }

    #[test]
    fn ago_formatting() {
        assert_eq!(ago(100.0, 100), "00h:00m:00s ago");
        assert_eq!(ago(100.0, 200), "00h:00m:00s ago");
        assert_eq!(ago(90_061.0, 0), "25h:01m:01s ago");
    }

    #[test]
    fn time_formatting() {
        assert_eq!(format_time(0), "1970-01-01 00:00:00 UTC");
    }
}
