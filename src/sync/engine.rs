//! Per-tick orchestration of actor synchronization
//!
//! Each tick drains inbound batches first, then refreshes mirrored actors,
//! then captures and broadcasts local ones. Handoffs triggered by inbound
//! cell changes are therefore visible to the same tick's capture.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::actor::record::ActorRecord;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::metrics::SyncMetrics;
use crate::net::inbound::{InboundQueue, InboundSender};
use crate::net::outbox::ActorOutbox;
use crate::net::protocol::{ActorBatch, FacetKind};
use crate::net::transport::Transport;
use crate::partition::directory::PartitionDirectory;
use crate::partition::id::{HostId, PartitionId};
use crate::partition::local_set::CaptureOutcome;
use crate::sync::inspect::ActorInspector;
use crate::sync::remote::{BatchReport, RemoteReconciler};
use crate::world::World;

/// Result of one local capture pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureReport {
    pub partitions_captured: usize,
    pub actors_captured: usize,
    pub batches_sent: usize,
    pub entries_sent: usize,
    /// Actors moved into another partition this host owns
    pub relocated: usize,
    /// Actors that left for a partition another host owns
    pub handed_off: usize,
    /// Departed actors kept local because their cell change failed to send
    pub deferred: usize,
    pub deleted: usize,
}

impl CaptureReport {
    fn merge(&mut self, other: &CaptureReport) {
        self.partitions_captured += other.partitions_captured;
        self.actors_captured += other.actors_captured;
        self.batches_sent += other.batches_sent;
        self.entries_sent += other.entries_sent;
        self.relocated += other.relocated;
        self.handed_off += other.handed_off;
        self.deferred += other.deferred;
        self.deleted += other.deleted;
    }
}

/// Result of one tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub batches_received: usize,
    pub inbound: BatchReport,
    pub remote_destroyed: usize,
    pub local: CaptureReport,
}

pub struct SyncEngine<W: World, T: Transport> {
    config: SyncConfig,
    directory: PartitionDirectory,
    world: W,
    transport: T,
    inbound: Option<InboundQueue>,
    metrics: Arc<SyncMetrics>,
}

impl<W: World, T: Transport> SyncEngine<W, T> {
    pub fn new(config: SyncConfig, world: W, transport: T, metrics: Arc<SyncMetrics>) -> Self {
        Self {
            config,
            directory: PartitionDirectory::new(),
            world,
            transport,
            inbound: None,
            metrics,
        }
    }

    /// Attach a queue that transport threads deliver inbound frames into
    pub fn with_inbound(mut self, queue: InboundQueue) -> Self {
        self.inbound = Some(queue);
        self
    }

    pub fn inbound_sender(&self) -> Option<InboundSender> {
        self.inbound.as_ref().map(InboundQueue::sender)
    }

    pub fn host(&self) -> HostId {
        self.config.host_id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn directory(&self) -> &PartitionDirectory {
        &self.directory
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.metrics
    }

    pub fn inspector(&self) -> ActorInspector<'_> {
        ActorInspector::new(&self.directory)
    }

    pub fn has_authority(&self, partition: &PartitionId) -> bool {
        self.directory.has_authority(partition, self.host())
    }

    // ========================================================================
    // Partition lifecycle
    // ========================================================================

    pub fn activate_partition(&mut self, partition: PartitionId) {
        self.directory.activate(partition);
    }

    /// Apply an authority assignment and reconcile the partition's sets
    ///
    /// Gaining authority replaces every mirrored actor with a local record
    /// and broadcasts them immediately. Losing it drops the local records;
    /// the new authority's broadcasts recreate them as remote ones.
    pub fn handle_authority_change(&mut self, partition: &PartitionId, host: HostId) -> usize {
        self.directory.activate(partition.clone());
        if let Err(e) = self.directory.set_authority(partition, host) {
            warn!(partition = %partition, error = %e, "Failed to assign authority");
            return 0;
        }

        if host != self.host() {
            let destroyed = self.directory.clear_local(partition);
            if destroyed > 0 {
                info!(partition = %partition, destroyed, "Lost authority, local actors released");
                SyncMetrics::add(&self.metrics.records_destroyed, destroyed);
            }
            return 0;
        }

        let destroyed = self.directory.clear_remote(partition);
        SyncMetrics::add(&self.metrics.records_destroyed, destroyed);
        let created = self.initialize_local_actors(partition);
        info!(partition = %partition, created, replaced = destroyed, "Gained authority");

        self.capture_partition(partition, Duration::ZERO, true);
        created
    }

    /// Create local records for the partition's actor entities
    ///
    /// Entities without a unique index, disabled or deleted ones, and actors
    /// already simulated here are skipped.
    pub fn initialize_local_actors(&mut self, partition: &PartitionId) -> usize {
        let mut created = 0;
        for entity in self.world.actors_in(partition) {
            let Some(identity) = self.world.identity_of(entity) else {
                continue;
            };
            if !identity.has_unique_index()
                || !self.world.is_enabled(entity)
                || self.world.is_deleted(entity)
                || self.directory.is_local_in(partition, &identity)
            {
                continue;
            }

            let record = ActorRecord::local(identity, entity, partition.clone());
            match self.directory.insert_local(record) {
                Ok(()) => created += 1,
                Err(e) => debug!(partition = %partition, error = %e, "Could not initialize local actor"),
            }
        }
        SyncMetrics::add(&self.metrics.records_created, created);
        created
    }

    /// Deactivate a partition, destroying its records
    pub fn deactivate_partition(&mut self, partition: &PartitionId) -> usize {
        let destroyed = self.directory.deactivate(partition).unwrap_or(0);
        SyncMetrics::add(&self.metrics.records_destroyed, destroyed);
        destroyed
    }

    /// Deactivate every partition with no actors and no player present
    pub fn deactivate_idle(&mut self) -> Vec<PartitionId> {
        let idle = self.directory.idle_partitions(&self.world);
        for partition in &idle {
            self.deactivate_partition(partition);
        }
        idle
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    /// Apply one inbound batch
    pub fn apply_batch(&mut self, batch: &ActorBatch) -> BatchReport {
        let host = self.host();
        let report = RemoteReconciler::new(&mut self.directory, &mut self.world, host).apply(batch);

        let m = &self.metrics;
        m.batches_received.fetch_add(1, Ordering::Relaxed);
        SyncMetrics::add(&m.entries_applied, report.applied);
        SyncMetrics::add(&m.entries_skipped, report.skipped);
        SyncMetrics::add(&m.stale_commands, report.stale);
        SyncMetrics::add(&m.records_created, report.created + report.promoted);
        SyncMetrics::add(&m.records_destroyed, report.promoted + report.discarded);
        SyncMetrics::add(&m.promotions, report.promoted);
        SyncMetrics::add(&m.migrations, report.migrated);
        report
    }

    /// Drain the inbound queue and apply everything in it
    pub fn drain_inbound(&mut self) -> (usize, BatchReport) {
        let Some(queue) = &self.inbound else {
            return (0, BatchReport::default());
        };
        let drained = queue.drain();
        SyncMetrics::add(&self.metrics.batches_rejected, drained.rejected);
        SyncMetrics::add(&self.metrics.bytes_received, drained.bytes);

        let mut total = BatchReport::default();
        for batch in &drained.batches {
            total.merge(&self.apply_batch(batch));
        }
        (drained.batches.len(), total)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    pub fn tick(&mut self, dt: Duration) -> TickReport {
        let start = Instant::now();

        let (batches_received, inbound) = self.drain_inbound();
        let remote_destroyed = self.update_remote();
        let local = self.update_local(dt, false);

        self.metrics.set_directory_gauges(
            self.directory.partition_count(),
            self.directory.local_count(),
            self.directory.remote_count(),
        );
        self.metrics.record_tick_time(start.elapsed());

        TickReport {
            batches_received,
            inbound,
            remote_destroyed,
            local,
        }
    }

    /// Refresh mirrored actors; in partitions this host owns they are destroyed
    ///
    /// Returns how many remote records were destroyed.
    pub fn update_remote(&mut self) -> usize {
        let host = self.host();
        let mut destroyed = 0;
        for partition in self.directory.partition_ids() {
            if self.directory.has_authority(&partition, host) {
                let cleared = self.directory.clear_remote(&partition);
                if cleared > 0 {
                    debug!(partition = %partition, cleared, "Dropped remote actors under own authority");
                }
                destroyed += cleared;
                continue;
            }
            if let Some(p) = self.directory.get(&partition) {
                p.remote().update(&mut self.world);
            }
        }
        SyncMetrics::add(&self.metrics.records_destroyed, destroyed);
        destroyed
    }

    /// Capture every partition's local actors, honoring the update gate
    pub fn update_local(&mut self, dt: Duration, force: bool) -> CaptureReport {
        let mut report = CaptureReport::default();
        for partition in self.directory.partition_ids() {
            report.merge(&self.capture_partition(&partition, dt, force));
        }
        report
    }

    /// Capture and send a partition right away, bypassing the gate
    pub fn send_now(&mut self, partition: &PartitionId) -> SyncResult<CaptureReport> {
        if !self.directory.is_active(partition) {
            return Err(SyncError::InactivePartition(partition.clone()));
        }
        Ok(self.capture_partition(partition, Duration::ZERO, true))
    }

    fn capture_partition(&mut self, partition: &PartitionId, dt: Duration, force: bool) -> CaptureReport {
        let mut report = CaptureReport::default();
        let interval = self.config.local_update_interval;
        let host = self.host();

        let Some(p) = self.directory.get_mut(partition) else {
            return report;
        };
        if p.local().is_empty() || !p.capture_due(dt, interval, force) {
            return report;
        }

        let mut outbox = ActorOutbox::new(partition.clone());
        let (outcomes, stats) = self
            .directory
            .capture_local(partition, &mut self.world, force, &mut outbox);
        report.partitions_captured = 1;
        report.actors_captured = stats.captured;

        // Records leaving for another host stay ours until their cell change is out
        let mut departing = Vec::new();
        for outcome in outcomes {
            match outcome {
                CaptureOutcome::Deleted(identity) => {
                    debug!(actor = %identity, partition = %partition, "Local actor deleted");
                    report.deleted += 1;
                }
                CaptureOutcome::Departed { record, destination } => {
                    if self.directory.has_authority(&destination, host) {
                        let identity = record.identity.clone();
                        match self.directory.insert_local(record) {
                            Ok(()) => {
                                debug!(actor = %identity, to = %destination, "Local actor relocated");
                                report.relocated += 1;
                            }
                            Err(e) => {
                                warn!(actor = %identity, error = %e, "Failed to relocate local actor");
                                report.handed_off += 1;
                            }
                        }
                    } else {
                        departing.push((record, destination));
                    }
                }
            }
        }

        let flushed = self.flush(outbox);
        report.batches_sent = flushed.batches;
        report.entries_sent = flushed.entries;

        if flushed.failed.contains(&FacetKind::CellChange) {
            for (mut record, destination) in departing {
                let identity = record.identity.clone();
                record.partition = partition.clone();
                match self.directory.insert_local(record) {
                    Ok(()) => {
                        warn!(actor = %identity, to = %destination, "Cell change not sent, handoff deferred");
                        report.deferred += 1;
                    }
                    Err(e) => {
                        warn!(actor = %identity, error = %e, "Failed to keep actor for handoff retry");
                        report.handed_off += 1;
                    }
                }
            }
        } else {
            for (record, destination) in &departing {
                debug!(actor = %record.identity, to = %destination, "Local actor handed off");
            }
            report.handed_off += departing.len();
        }

        SyncMetrics::add(&self.metrics.handoffs, report.handed_off);
        SyncMetrics::add(&self.metrics.records_destroyed, report.handed_off + report.deleted);
        report
    }

    /// Send an outbox as one broadcast batch per facet kind
    fn flush(&mut self, outbox: ActorOutbox) -> Flushed {
        let mut flushed = Flushed::default();
        for batch in outbox.into_batches() {
            match self.transport.send_batch(&batch, true, true) {
                Ok(bytes) => {
                    flushed.batches += 1;
                    flushed.entries += batch.len();
                    SyncMetrics::add(&self.metrics.bytes_sent, bytes);
                }
                Err(e) => {
                    warn!(kind = ?batch.kind, partition = %batch.partition, error = %e, "Failed to send batch");
                    self.metrics.send_failures.fetch_add(1, Ordering::Relaxed);
                    flushed.failed.push(batch.kind);
                }
            }
        }
        SyncMetrics::add(&self.metrics.batches_sent, flushed.batches);
        SyncMetrics::add(&self.metrics.entries_sent, flushed.entries);
        flushed
    }
}

#[derive(Debug, Default)]
struct Flushed {
    batches: usize,
    entries: usize,
    failed: SmallVec<[FacetKind; 2]>,
}
