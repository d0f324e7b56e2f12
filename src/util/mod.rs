pub mod vec3;

/// Hash map keyed with FxHash, used for every identity-keyed collection
pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, rustc_hash::FxBuildHasher>;
