pub mod access;
pub mod api;
pub mod progress;
pub mod replicator;
