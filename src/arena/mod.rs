// Arena-based storage for reactive node metadata
//
// This module provides two separate arenas:
// - Channel arena: stores ChannelMetadata (uid, observer list, pass depth)
// - Computation arena: stores ComputationMetadata (update closure, source set)
//
// The arenas use global static storage with RwLock for thread-safe access.
// ChannelId and ComputationId are lightweight newtypes that index into the
// slabs; the owning handles remove their entries on drop, so a retained id
// can go stale and every accessor treats a stale id as absent.

// Note: computation_arena is declared first because channel_arena depends on
// ComputationId and run_update
pub mod computation_arena;

pub mod channel_arena;

// Re-export types from computation_arena
pub use computation_arena::{
    ComputationId, ComputationMetadata, computation_arena_insert, computation_arena_remove,
    run_update,
};

// Re-export types from channel_arena
pub use channel_arena::{ChannelId, ChannelMetadata, channel_arena_insert, channel_arena_remove};
