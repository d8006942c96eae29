//! # Voxel World Core
//!
//! Leaves first:
//! - [`block`]: the block catalog and the per-voxel [`block::BlockInstance`]
//! - [`chunk`]: fixed-size voxel containers and chunk coordinates
//! - [`generation`]: deterministic terrain synthesis
//! - [`persistence`]: versioned on-disk chunk and world documents
//! - [`tasks`]: chunk work run on the worker pool
//! - [`manager`]: the resident chunk set around a moving point of interest

pub mod block;
pub mod chunk;
pub mod generation;
pub mod manager;
pub mod persistence;
pub mod tasks;
