//! Actors mirrored from the partition's authority

use tracing::trace;

use crate::actor::identity::ActorIdentity;
use crate::actor::record::ActorRecord;
use crate::error::SyncResult;
use crate::util::FxHashMap;
use crate::world::World;

#[derive(Debug, Default)]
pub struct RemoteActorSet {
    actors: FxHashMap<ActorIdentity, ActorRecord>,
}

impl RemoteActorSet {
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

    /// Re-apply the continuously-driven facets to every mirrored actor
    ///
    /// Movement and stance only take effect in the world while they are
    /// refreshed each frame, so this runs every tick. Returns how many
    /// actors failed to update.
    pub(crate) fn update<W: World>(&self, world: &mut W) -> usize {
        let mut failed = 0;
        for record in self.actors.values() {
            if let Err(e) = refresh(record, world) {
                trace!(actor = %record.identity, error = %e, "Remote update failed");
                failed += 1;
            }
        }
        failed
    }
}

fn refresh<W: World>(record: &ActorRecord, world: &mut W) -> SyncResult<()> {
    if record.has_position_data {
        record.set_position(world)?;
    }
    record.set_anim_flags(world)?;
    if record.has_stats_dynamic_data {
        record.set_stats_dynamic(world)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::facets::{DrawState, PositionFacet};
    use crate::partition::id::PartitionId;
    use crate::util::vec3::Vec3;
    use crate::world::MemoryWorld;

    #[test]
    fn test_update_reapplies_known_facets() {
        let mut world = MemoryWorld::new();
        let cell = PartitionId::exterior(0, 0);
        let id = ActorIdentity::new(3, 1, "alit");
        let entity = world.spawn(id.clone(), cell.clone());

        let mut record = ActorRecord::remote(id.clone(), entity, cell);
        record.position = PositionFacet::new(Vec3::new(4.0, 4.0, 0.0), Vec3::ZERO);
        record.has_position_data = true;
        record.anim_flags.draw_state = DrawState::Weapon;

        let mut set = RemoteActorSet::default();
        set.insert(record);

        // Local simulation drifts the entity
        world.entity_mut(entity).unwrap().position.position = Vec3::new(9.0, 9.0, 0.0);

        assert_eq!(set.update(&mut world), 0);
        let e = world.entity(entity).unwrap();
        assert_eq!(e.position.position, Vec3::new(4.0, 4.0, 0.0));
        assert_eq!(e.anim_flags.draw_state, DrawState::Weapon);
        // No stats received yet, so the world keeps its own
        assert_eq!(e.stats.health.current, 100.0);
    }

    #[test]
    fn test_update_counts_missing_entities() {
        let mut world = MemoryWorld::new();
        let mut set = RemoteActorSet::default();
        set.insert(ActorRecord::remote(
            ActorIdentity::new(1, 0, "ghost"),
            99,
            PartitionId::exterior(0, 0),
        ));
        assert_eq!(set.update(&mut world), 1);
    }
}
