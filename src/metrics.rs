//! Prometheus-compatible metrics endpoint
//!
//! Exposes reconciliation counters in Prometheus format and as JSON.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

/// Samples kept for tick-time percentiles
const TICK_HISTORY_LEN: usize = 1000;

/// Metrics registry for one sync engine
#[derive(Debug)]
pub struct SyncMetrics {
    // Tick timing (microseconds)
    pub tick_count: AtomicU64,
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,

    // Directory gauges
    pub partitions_active: AtomicU64,
    pub local_actors: AtomicU64,
    pub remote_actors: AtomicU64,

    // Traffic
    pub batches_sent: AtomicU64,
    pub batches_received: AtomicU64,
    pub batches_rejected: AtomicU64,
    pub entries_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub send_failures: AtomicU64,

    // Reconciliation
    pub entries_applied: AtomicU64,
    pub entries_skipped: AtomicU64,
    pub stale_commands: AtomicU64,
    pub records_created: AtomicU64,
    pub records_destroyed: AtomicU64,
    /// Local actors that left for a partition this host does not own
    pub handoffs: AtomicU64,
    /// Remote actors that became local through a cell change
    pub promotions: AtomicU64,
    /// Remote actors that moved into another remote set
    pub migrations: AtomicU64,

    start_time: Instant,

    // Rolling tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

/// Point-in-time copy of every metric, for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub performance: PerformanceSnapshot,
    pub directory: DirectorySnapshot,
    pub traffic: TrafficSnapshot,
    pub reconciliation: ReconciliationSnapshot,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub tick_count: u64,
    pub tick_time_us: u64,
    pub tick_time_p95_us: u64,
    pub tick_time_p99_us: u64,
    pub tick_time_max_us: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectorySnapshot {
    pub partitions: u64,
    pub local_actors: u64,
    pub remote_actors: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrafficSnapshot {
    pub batches_sent: u64,
    pub batches_received: u64,
    pub batches_rejected: u64,
    pub entries_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationSnapshot {
    pub entries_applied: u64,
    pub entries_skipped: u64,
    pub stale_commands: u64,
    pub records_created: u64,
    pub records_destroyed: u64,
    pub handoffs: u64,
    pub promotions: u64,
    pub migrations: u64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            tick_count: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            partitions_active: AtomicU64::new(0),
            local_actors: AtomicU64::new(0),
            remote_actors: AtomicU64::new(0),
            batches_sent: AtomicU64::new(0),
            batches_received: AtomicU64::new(0),
            batches_rejected: AtomicU64::new(0),
            entries_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            entries_applied: AtomicU64::new(0),
            entries_skipped: AtomicU64::new(0),
            stale_commands: AtomicU64::new(0),
            records_created: AtomicU64::new(0),
            records_destroyed: AtomicU64::new(0),
            handoffs: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            migrations: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    #[inline]
    pub fn add(counter: &AtomicU64, value: usize) {
        if value > 0 {
            counter.fetch_add(value as u64, Ordering::Relaxed);
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Update the directory gauges
    pub fn set_directory_gauges(&self, partitions: usize, local: usize, remote: usize) {
        self.partitions_active.store(partitions as u64, Ordering::Relaxed);
        self.local_actors.store(local as u64, Ordering::Relaxed);
        self.remote_actors.store(remote as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            performance: PerformanceSnapshot {
                tick_count: load(&self.tick_count),
                tick_time_us: load(&self.tick_time_us),
                tick_time_p95_us: load(&self.tick_time_p95_us),
                tick_time_p99_us: load(&self.tick_time_p99_us),
                tick_time_max_us: load(&self.tick_time_max_us),
            },
            directory: DirectorySnapshot {
                partitions: load(&self.partitions_active),
                local_actors: load(&self.local_actors),
                remote_actors: load(&self.remote_actors),
            },
            traffic: TrafficSnapshot {
                batches_sent: load(&self.batches_sent),
                batches_received: load(&self.batches_received),
                batches_rejected: load(&self.batches_rejected),
                entries_sent: load(&self.entries_sent),
                bytes_sent: load(&self.bytes_sent),
                bytes_received: load(&self.bytes_received),
                send_failures: load(&self.send_failures),
            },
            reconciliation: ReconciliationSnapshot {
                entries_applied: load(&self.entries_applied),
                entries_skipped: load(&self.entries_skipped),
                stale_commands: load(&self.stale_commands),
                records_created: load(&self.records_created),
                records_destroyed: load(&self.records_destroyed),
                handoffs: load(&self.handoffs),
                promotions: load(&self.promotions),
                migrations: load(&self.migrations),
            },
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        let s = self.snapshot();

        // Performance
        metric!("cellsync_tick_count", "Total ticks processed", "counter", s.performance.tick_count);
        metric!("cellsync_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            s.performance.tick_time_us);
        metric!("cellsync_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            s.performance.tick_time_p95_us);
        metric!("cellsync_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            s.performance.tick_time_p99_us);
        metric!("cellsync_tick_time_max_microseconds", "Maximum tick time", "gauge",
            s.performance.tick_time_max_us);

        // Directory
        metric!("cellsync_partitions_active", "Active partitions", "gauge", s.directory.partitions);
        metric!("cellsync_local_actors", "Actors simulated on this host", "gauge",
            s.directory.local_actors);
        metric!("cellsync_remote_actors", "Actors mirrored from other hosts", "gauge",
            s.directory.remote_actors);

        // Traffic
        metric!("cellsync_batches_sent_total", "Batches sent", "counter", s.traffic.batches_sent);
        metric!("cellsync_batches_received_total", "Batches received", "counter",
            s.traffic.batches_received);
        metric!("cellsync_batches_rejected_total", "Inbound frames that failed to decode", "counter",
            s.traffic.batches_rejected);
        metric!("cellsync_entries_sent_total", "Actor entries sent", "counter", s.traffic.entries_sent);
        metric!("cellsync_bytes_sent_total", "Total bytes sent", "counter", s.traffic.bytes_sent);
        metric!("cellsync_bytes_received_total", "Total bytes received", "counter",
            s.traffic.bytes_received);
        metric!("cellsync_send_failures_total", "Batches the transport failed to send", "counter",
            s.traffic.send_failures);

        // Reconciliation
        metric!("cellsync_entries_applied_total", "Inbound entries applied", "counter",
            s.reconciliation.entries_applied);
        metric!("cellsync_entries_skipped_total", "Inbound entries skipped", "counter",
            s.reconciliation.entries_skipped);
        metric!("cellsync_stale_commands_total", "Cell changes naming the current partition", "counter",
            s.reconciliation.stale_commands);
        metric!("cellsync_records_created_total", "Actor records created", "counter",
            s.reconciliation.records_created);
        metric!("cellsync_records_destroyed_total", "Actor records destroyed", "counter",
            s.reconciliation.records_destroyed);
        metric!("cellsync_handoffs_total", "Local actors handed to another authority", "counter",
            s.reconciliation.handoffs);
        metric!("cellsync_promotions_total", "Remote actors promoted to local", "counter",
            s.reconciliation.promotions);
        metric!("cellsync_migrations_total", "Remote actors moved between partitions", "counter",
            s.reconciliation.migrations);

        metric!("cellsync_uptime_seconds", "Host uptime in seconds", "counter", s.uptime_seconds);

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<SyncMetrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = route(&request, &metrics);

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}

/// Build the HTTP response for a request
fn route(request: &str, metrics: &SyncMetrics) -> String {
    let ok = |content_type: &str, body: String| {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            content_type,
            body.len(),
            body
        )
    };

    if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
        ok("application/json", metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        ok("text/plain; version=0.0.4", metrics.to_prometheus())
    } else if request.starts_with("GET /health") || request.starts_with("GET / ") {
        ok("text/plain", "OK".to_string())
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }
}
