//! post-batcher domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: Provider chain, generation session and publishing
//! - `policy`: Acceptance constraints for generated candidates
//! - `format`: Block delimiter grammar and extractor
//! - `prompt`: Prompt templates

pub mod format;
pub mod model;
pub mod policy;
pub mod ports;
pub mod prompt;
pub mod usecases;

pub use model::*;
pub use ports::*;
