//! Actors this host simulates within one partition
//!
//! The capture pass reads each actor's live state from the world, keeps what
//! changed in the record and queues it into the partition's outbox. Actors
//! that left the partition or vanished from the world are taken out of the
//! set and reported back, since placing them elsewhere needs the directory.

use tracing::{debug, trace};

use crate::actor::facets::{CellChangeFacet, DeathFacet};
use crate::actor::identity::ActorIdentity;
use crate::actor::record::ActorRecord;
use crate::error::SyncResult;
use crate::net::outbox::ActorOutbox;
use crate::net::protocol::Facet;
use crate::partition::id::PartitionId;
use crate::util::FxHashMap;
use crate::world::{ActorEvent, World};

/// Death state reported when a local actor is seen dying
pub const DEATH_STATE_DYING: i32 = 1;

/// What happened to an actor removed during capture
#[derive(Debug)]
pub enum CaptureOutcome {
    /// The actor is now in another partition; its cell change is queued
    Departed {
        record: ActorRecord,
        destination: PartitionId,
    },
    /// The world entity is gone or deleted
    Deleted(ActorIdentity),
}

/// Counters for one capture pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub captured: usize,
    pub skipped_disabled: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct LocalActorSet {
    actors: FxHashMap<ActorIdentity, ActorRecord>,
}

impl LocalActorSet {
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn contains(&self, identity: &ActorIdentity) -> bool {
        self.actors.contains_key(identity)
    }

    pub fn get(&self, identity: &ActorIdentity) -> Option<&ActorRecord> {
        self.actors.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActorRecord> {
        self.actors.values()
    }

    pub fn identities(&self) -> Vec<ActorIdentity> {
        let mut ids: Vec<_> = self.actors.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub(crate) fn get_mut(&mut self, identity: &ActorIdentity) -> Option<&mut ActorRecord> {
        self.actors.get_mut(identity)
    }

    pub(crate) fn insert(&mut self, record: ActorRecord) -> Option<ActorRecord> {
        self.actors.insert(record.identity.clone(), record)
    }

    pub(crate) fn remove(&mut self, identity: &ActorIdentity) -> Option<ActorRecord> {
        self.actors.remove(identity)
    }

    pub(crate) fn drain_all(&mut self) -> Vec<ActorRecord> {
        self.actors.drain().map(|(_, record)| record).collect()
    }

    /// Capture every actor's state into `outbox`
    ///
    /// With `force` every facet is queued whether or not it changed. An actor
    /// that has never been sent is always captured in full.
    pub(crate) fn capture<W: World>(
        &mut self,
        world: &mut W,
        source: &PartitionId,
        force: bool,
        outbox: &mut ActorOutbox,
    ) -> (Vec<CaptureOutcome>, CaptureStats) {
        let mut outcomes = Vec::new();
        let mut stats = CaptureStats::default();

        for identity in self.identities() {
            let Some(record) = self.actors.get_mut(&identity) else {
                continue;
            };
            let entity = record.entity;

            let current = match world.partition_of(entity) {
                Some(current) => current,
                None => {
                    self.actors.remove(&identity);
                    outcomes.push(CaptureOutcome::Deleted(identity));
                    continue;
                }
            };

            if current != *source {
                let Some(mut record) = self.actors.remove(&identity) else {
                    continue;
                };
                if let Ok(position) = world.read_position(entity) {
                    record.position = position;
                }
                record.partition = current.clone();
                debug!(actor = %identity, from = %source, to = %current, "Local actor left partition");
                outbox.push(
                    identity,
                    Facet::CellChange(CellChangeFacet {
                        destination: current.clone(),
                        position: record.position,
                    }),
                );
                outcomes.push(CaptureOutcome::Departed {
                    record,
                    destination: current,
                });
                continue;
            }

            if !world.is_enabled(entity) {
                stats.skipped_disabled += 1;
                continue;
            }

            if world.is_deleted(entity) {
                self.actors.remove(&identity);
                outcomes.push(CaptureOutcome::Deleted(identity));
                continue;
            }

            let forced = force || !record.has_sent_data;
            match capture_record(world, record, forced, outbox) {
                Ok(()) => stats.captured += 1,
                Err(e) => {
                    debug!(actor = %identity, error = %e, "Capture failed");
                    stats.failed += 1;
                }
            }
        }

        (outcomes, stats)
    }
}

/// Read one actor's live state and queue the facets that changed
fn capture_record<W: World>(
    world: &mut W,
    record: &mut ActorRecord,
    force: bool,
    outbox: &mut ActorOutbox,
) -> SyncResult<()> {
    let entity = record.entity;
    let identity = record.identity.clone();

    // Stats and equipment are tracked even for the dead
    let stats = world.read_stats_dynamic(entity)?;
    if force || stats.differs_from(&record.stats) {
        let died = stats.dead && !record.stats.dead && record.has_sent_data;
        record.stats = stats;
        outbox.push(identity.clone(), Facet::StatsDynamic(stats));
        if died {
            record.death = DeathFacet {
                death_state: DEATH_STATE_DYING,
                instant: false,
            };
            outbox.push(identity.clone(), Facet::Death(record.death));
        }
    }

    let equipment = world.read_equipment(entity)?;
    if force || equipment != record.equipment {
        record.equipment = equipment;
        outbox.push(identity.clone(), Facet::Equipment(Box::new(record.equipment.clone())));
    }

    let events = world.drain_events(entity);
    if !force && record.stats.dead {
        if !events.is_empty() {
            trace!(actor = %identity, count = events.len(), "Dropping events of dead actor");
        }
        record.has_sent_data = true;
        return Ok(());
    }

    let position = world.read_position(entity)?;
    if force || position.differs_from(&record.position) {
        record.position = position;
        outbox.push(identity.clone(), Facet::Position(position));
    }

    let anim_flags = world.read_anim_flags(entity)?;
    if force || anim_flags != record.anim_flags {
        record.anim_flags = anim_flags;
        outbox.push(identity.clone(), Facet::AnimFlags(anim_flags));
    }

    for event in events {
        match event {
            ActorEvent::AnimationPlayed(animation) => {
                record.animation = animation.clone();
                outbox.push(identity.clone(), Facet::AnimPlay(animation));
            }
            ActorEvent::Spoke(sound) => {
                record.sound = sound.clone();
                outbox.push(identity.clone(), Facet::Speech(sound));
            }
            ActorEvent::Attacked(attack) => {
                record.attack = attack.clone();
                outbox.push(identity.clone(), Facet::Attack(attack));
            }
            ActorEvent::Cast(cast) => {
                record.cast = cast.clone();
                outbox.push(identity.clone(), Facet::Cast(cast));
            }
        }
    }

    record.has_sent_data = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::facets::{Attack, PositionFacet};
    use crate::net::protocol::FacetKind;
    use crate::util::vec3::Vec3;
    use crate::world::MemoryWorld;

    fn setup(count: u32) -> (MemoryWorld, LocalActorSet, PartitionId) {
        let mut world = MemoryWorld::new();
        let cell = PartitionId::exterior(0, 0);
        let mut set = LocalActorSet::default();
        for n in 1..=count {
            let id = ActorIdentity::new(n, 0, "cliff_racer");
            let entity = world.spawn(id.clone(), cell.clone());
            set.insert(ActorRecord::local(id, entity, cell.clone()));
        }
        (world, set, cell)
    }

    #[test]
    fn test_first_capture_sends_everything() {
        let (mut world, mut set, cell) = setup(2);
        let mut outbox = ActorOutbox::new(cell.clone());

        let (outcomes, stats) = set.capture(&mut world, &cell, false, &mut outbox);

        assert!(outcomes.is_empty());
        assert_eq!(stats.captured, 2);
        assert_eq!(outbox.count(FacetKind::Position), 2);
        assert_eq!(outbox.count(FacetKind::StatsDynamic), 2);
        assert_eq!(outbox.count(FacetKind::Equipment), 2);
        assert!(set.iter().all(|r| r.has_sent_data));
    }

    #[test]
    fn test_unchanged_actor_sends_nothing() {
        let (mut world, mut set, cell) = setup(1);
        set.capture(&mut world, &cell, false, &mut ActorOutbox::new(cell.clone()));

        let mut outbox = ActorOutbox::new(cell.clone());
        set.capture(&mut world, &cell, false, &mut outbox);
        assert!(outbox.is_empty());

        let mut forced = ActorOutbox::new(cell.clone());
        set.capture(&mut world, &cell, true, &mut forced);
        assert_eq!(forced.count(FacetKind::Position), 1);
    }

    #[test]
    fn test_small_moves_below_epsilon_ignored() {
        let (mut world, mut set, cell) = setup(1);
        set.capture(&mut world, &cell, false, &mut ActorOutbox::new(cell.clone()));

        let entity = set.iter().next().unwrap().entity;
        world.entity_mut(entity).unwrap().position.position = Vec3::new(0.05, 0.0, 0.0);
        let mut outbox = ActorOutbox::new(cell.clone());
        set.capture(&mut world, &cell, false, &mut outbox);
        assert_eq!(outbox.count(FacetKind::Position), 0);

        world.entity_mut(entity).unwrap().position.position = Vec3::new(3.0, 0.0, 0.0);
        let mut outbox = ActorOutbox::new(cell.clone());
        set.capture(&mut world, &cell, false, &mut outbox);
        assert_eq!(outbox.count(FacetKind::Position), 1);
    }

    #[test]
    fn test_departed_actor_reported_with_cell_change() {
        let (mut world, mut set, cell) = setup(2);
        let id = ActorIdentity::new(1, 0, "cliff_racer");
        let entity = set.get(&id).unwrap().entity;
        let destination = PartitionId::exterior(1, 0);
        world.entity_mut(entity).unwrap().position =
            PositionFacet::new(Vec3::new(8200.0, 5.0, 0.0), Vec3::ZERO);
        world.move_to_partition(entity, &destination).unwrap();

        let mut outbox = ActorOutbox::new(cell.clone());
        let (outcomes, _) = set.capture(&mut world, &cell, false, &mut outbox);

        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            CaptureOutcome::Departed { record, destination: to } => {
                assert_eq!(record.identity, id);
                assert_eq!(*to, destination);
                assert_eq!(record.partition, destination);
                assert_eq!(record.position.position.x, 8200.0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!set.contains(&id));
        assert_eq!(set.len(), 1);
        assert_eq!(outbox.count(FacetKind::CellChange), 1);
    }

    #[test]
    fn test_deleted_and_disabled_actors() {
        let (mut world, mut set, cell) = setup(2);
        let gone = ActorIdentity::new(1, 0, "cliff_racer");
        let hidden = ActorIdentity::new(2, 0, "cliff_racer");
        world.entity_mut(set.get(&gone).unwrap().entity).unwrap().deleted = true;
        world.entity_mut(set.get(&hidden).unwrap().entity).unwrap().enabled = false;

        let mut outbox = ActorOutbox::new(cell.clone());
        let (outcomes, stats) = set.capture(&mut world, &cell, false, &mut outbox);

        assert!(matches!(&outcomes[..], [CaptureOutcome::Deleted(id)] if *id == gone));
        assert_eq!(stats.skipped_disabled, 1);
        assert!(set.contains(&hidden));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_death_sent_once() {
        let (mut world, mut set, cell) = setup(1);
        set.capture(&mut world, &cell, false, &mut ActorOutbox::new(cell.clone()));

        let entity = set.iter().next().unwrap().entity;
        {
            let e = world.entity_mut(entity).unwrap();
            e.stats.health.current = 0.0;
            e.stats.dead = true;
        }

        let mut outbox = ActorOutbox::new(cell.clone());
        set.capture(&mut world, &cell, false, &mut outbox);
        assert_eq!(outbox.count(FacetKind::Death), 1);
        assert_eq!(outbox.count(FacetKind::StatsDynamic), 1);

        let mut outbox = ActorOutbox::new(cell.clone());
        set.capture(&mut world, &cell, false, &mut outbox);
        assert_eq!(outbox.count(FacetKind::Death), 0);
    }

    #[test]
    fn test_dead_actor_skips_motion_unless_forced() {
        let (mut world, mut set, cell) = setup(1);
        set.capture(&mut world, &cell, false, &mut ActorOutbox::new(cell.clone()));

        let entity = set.iter().next().unwrap().entity;
        world.entity_mut(entity).unwrap().stats.dead = true;
        set.capture(&mut world, &cell, false, &mut ActorOutbox::new(cell.clone()));

        world.entity_mut(entity).unwrap().position.position = Vec3::new(50.0, 0.0, 0.0);
        world.push_event(entity, ActorEvent::Attacked(Attack::default()));
        let mut outbox = ActorOutbox::new(cell.clone());
        set.capture(&mut world, &cell, false, &mut outbox);
        assert_eq!(outbox.count(FacetKind::Position), 0);
        assert_eq!(outbox.count(FacetKind::Attack), 0);

        let mut outbox = ActorOutbox::new(cell.clone());
        set.capture(&mut world, &cell, true, &mut outbox);
        assert_eq!(outbox.count(FacetKind::Position), 1);
    }

    #[test]
    fn test_events_become_facets() {
        let (mut world, mut set, cell) = setup(1);
        set.capture(&mut world, &cell, false, &mut ActorOutbox::new(cell.clone()));

        let entity = set.iter().next().unwrap().entity;
        world.push_event(entity, ActorEvent::Spoke("hello".into()));
        world.push_event(entity, ActorEvent::Attacked(Attack::default()));

        let mut outbox = ActorOutbox::new(cell.clone());
        set.capture(&mut world, &cell, false, &mut outbox);
        assert_eq!(outbox.count(FacetKind::Speech), 1);
        assert_eq!(outbox.count(FacetKind::Attack), 1);
        assert_eq!(set.iter().next().unwrap().sound, "hello");
    }
}
