//! Repository traits for metadata operations.

pub mod chunks;
pub mod sessions;

pub use chunks::{ChunkIndexRepo, RememberOutcome};
pub use sessions::SessionRepo;
