//! Application use cases / business logic

pub mod chain;
pub mod generate;
pub mod publish;

pub use chain::{ChainConfig, ChainFailure, ProviderChain};
pub use generate::{GenerationConfig, GenerationSession, SessionError, SessionResult};
pub use publish::{PublishConfig, PublishReport, PublishRunError, PublishUseCase};
