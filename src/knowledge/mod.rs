pub mod batch;
pub mod chunker;
pub mod context;
pub mod formatting;
pub mod manager;
pub mod store;
pub mod summarizer;
pub mod types;

pub use context::ContextAssembler;
pub use manager::KnowledgeManager;
pub use store::{KnowledgeIndex, KnowledgeStore};
pub use types::IngestResult;
