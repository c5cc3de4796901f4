//! Runtime adapters for scheduling event handlers onto workers.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
