//! post-batcher adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `llm`: Text provider adapters (OpenAI-compatible, Anthropic, Gemini, Ollama, stub)
//! - `sentiment`: VADER positivity scorer
//! - `batch`: Filesystem batch store
//! - `history`: JSONL, SQLite and in-memory history logs
//! - `x`: X (Twitter) publishing adapters
//! - `outbox`: JSONL outbox for require-approval mode

mod batch_fs;
mod history_jsonl;
mod state_memory;
mod state_sqlite;

pub mod llm;
pub mod outbox;
pub mod reserve_fs;
pub mod sentiment;
pub mod x_api;

/// Re-exports for batch stores
pub mod batch {
    pub use crate::batch_fs::FsBatchStore;
}

/// Re-exports for history logs
pub mod history {
    pub use crate::history_jsonl::JsonlHistoryLog;
    pub use crate::state_memory::InMemoryHistoryLog;
    pub use crate::state_sqlite::SqliteHistoryLog;
}

/// Re-exports for X API adapters
pub mod x {
    pub use crate::x_api::XPublisher;
}
