//! Public library API for navigating frozen managed heap snapshots.

/// Heap object model, field resolution, session, and snapshot image provider.
pub mod dump;
