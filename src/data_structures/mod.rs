//! Engine data structures: parsed models and GPU textures.
//!
//! - `model` contains mesh/material records and the two vertex formats
//! - `texture` contains the GPU texture wrapper and creation utilities

pub mod model;
pub mod texture;
