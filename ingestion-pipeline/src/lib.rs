#![allow(clippy::missing_docs_in_private_items)]

pub mod chunker;
pub mod extract;
pub mod pipeline;

pub use chunker::{chunk_text, ChunkConfig};
pub use pipeline::{IngestOutcome, IngestionPipeline};
