use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cellsync::actor::ActorIdentity;
use cellsync::config::SyncConfig;
use cellsync::metrics::{self, SyncMetrics};
use cellsync::net::{ChannelTransport, InboundQueue};
use cellsync::partition::{HostId, PartitionId};
use cellsync::sync::SyncEngine;
use cellsync::util::vec3::Vec3;
use cellsync::world::{MemoryWorld, World};

type Host = SyncEngine<MemoryWorld, ChannelTransport>;

/// Actors spawned per cell
const ACTORS_PER_CELL: u32 = 16;

/// Maximum distance an actor wanders per tick
const WANDER_STEP: f32 = 40.0;

/// Seconds between status lines
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Cellsync host v{}", env!("CARGO_PKG_VERSION"));

    let config = SyncConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: tick_rate={}, local_update_interval={:?}, inbound_capacity={}",
        config.tick_rate, config.local_update_interval, config.inbound_capacity
    );

    // Two hosts in one process, wired to each other's inbound queues
    let queue_a = InboundQueue::new(config.inbound_capacity);
    let queue_b = InboundQueue::new(config.inbound_capacity);
    let transport_a = ChannelTransport::new().with_peer(queue_b.sender());
    let transport_b = ChannelTransport::new().with_peer(queue_a.sender());

    let metrics = Arc::new(SyncMetrics::new());
    let host_b_id: HostId = uuid::Uuid::new_v4();
    let mut a = SyncEngine::new(config.clone(), MemoryWorld::new(), transport_a, metrics.clone())
        .with_inbound(queue_a);
    let mut b = SyncEngine::new(
        config.for_host(host_b_id),
        MemoryWorld::new(),
        transport_b,
        Arc::new(SyncMetrics::new()),
    )
    .with_inbound(queue_b);

    let west = PartitionId::exterior(0, 0);
    let east = PartitionId::exterior(1, 0);
    populate(&mut a, &mut b, &west, 0.0);
    populate(&mut a, &mut b, &east, 8192.0);

    let host_a_id = a.host();
    for host in [&mut a, &mut b] {
        host.handle_authority_change(&west, host_a_id);
        host.handle_authority_change(&east, host_b_id);
    }
    info!("Host {} owns {}, host {} owns {}", host_a_id, west, host_b_id, east);

    let metrics_port = config.metrics_port;
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let tick_interval = config.tick_interval();
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_status = Instant::now();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                wander(&mut a);
                wander(&mut b);
                a.tick(tick_interval);
                b.tick(tick_interval);

                if last_status.elapsed() >= STATUS_INTERVAL {
                    last_status = Instant::now();
                    log_status("A", &a);
                    log_status("B", &b);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Host stopped after {} ticks", metrics.snapshot().performance.tick_count);
    Ok(())
}

/// Spawn the same actors into a cell on both hosts
fn populate(a: &mut Host, b: &mut Host, cell: &PartitionId, origin_x: f32) {
    let mut rng = rand::thread_rng();
    let base = if origin_x > 0.0 { 1000 } else { 1 };
    for n in 0..ACTORS_PER_CELL {
        let identity = ActorIdentity::new(base + n, 0, format!("wanderer_{}", base + n));
        let position = Vec3::new(
            origin_x + rng.gen_range(1000.0..7000.0),
            rng.gen_range(1000.0..7000.0),
            0.0,
        );
        for host in [&mut *a, &mut *b] {
            let world = host.world_mut();
            let entity = world.spawn(identity.clone(), cell.clone());
            if let Some(e) = world.entity_mut(entity) {
                e.position.position = position;
            }
        }
    }
}

/// Move every actor this host simulates, carrying it across cell borders
fn wander(host: &mut Host) {
    let mut rng = rand::thread_rng();
    let entities: Vec<u64> = host
        .directory()
        .partition_ids()
        .iter()
        .filter_map(|id| host.directory().get(id))
        .flat_map(|p| p.local().iter().map(|r| r.entity).collect::<Vec<_>>())
        .collect();

    let world = host.world_mut();
    for entity in entities {
        let Some(e) = world.entity_mut(entity) else {
            continue;
        };
        let p = &mut e.position.position;
        p.x = (p.x + rng.gen_range(-WANDER_STEP..WANDER_STEP)).clamp(0.0, 16383.0);
        p.y = (p.y + rng.gen_range(-WANDER_STEP..WANDER_STEP)).clamp(0.0, 8191.0);
        let cell = PartitionId::exterior_at(*p);

        if world.partition_of(entity).as_ref() != Some(&cell) {
            if let Err(e) = world.move_to_partition(entity, &cell) {
                error!("Failed to move entity {}: {}", entity, e);
            }
        }
    }
}

fn log_status(name: &str, host: &Host) {
    let snapshot = host.metrics().snapshot();
    info!(
        "Host {}: local={} remote={} sent={} received={} handoffs={} promotions={} tick={}us (p99 {}us)",
        name,
        host.directory().local_count(),
        host.directory().remote_count(),
        snapshot.traffic.batches_sent,
        snapshot.traffic.batches_received,
        snapshot.reconciliation.handoffs,
        snapshot.reconciliation.promotions,
        snapshot.performance.tick_time_us,
        snapshot.performance.tick_time_p99_us,
    );
}
