//! Networked actor data model
//!
//! Identity keys, facet payloads and the actor record with its mutators.

pub mod facets;
pub mod identity;
pub mod record;

pub use identity::ActorIdentity;
pub use record::{ActorRecord, Ownership};
