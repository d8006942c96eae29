//! # Voxel Task System
//!
//! This module contains the chunk work the manager hands to the worker pool:
//! resolving chunks that became required and saving chunk snapshots. Tasks
//! own `Arc`s to the immutable world services and never touch the chunk table
//! directly; their results are applied on the owning thread.

pub mod chunk_resolution_task;
pub mod chunk_save_task;

pub use chunk_resolution_task::{resolve_chunk, ChunkResolutionTask};
pub use chunk_save_task::ChunkSaveTask;
