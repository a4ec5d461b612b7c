//! Question answering for docrag.
//!
//! [`QueryService`] is the entry point: it lists documents with their
//! indexing status, ingests documents on first use, and answers questions
//! from the chunks most similar to the question.
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag_query::{OpenAiGenerator, QueryConfig, QueryService};
//!
//! let generator = Arc::new(OpenAiGenerator::with_defaults(&api_key)?);
//! let service = QueryService::new(ingestor, generator, QueryConfig::default());
//!
//! let answer = service.ask("report.pdf", "What was Q3 revenue?").await?;
//! println!("{}", answer.answer);
//! ```

pub mod lock;
pub mod openai;
pub mod prompt;
pub mod service;

pub use lock::IngestLocks;
pub use openai::OpenAiGenerator;
pub use prompt::{build_context, build_prompt, NO_CONTEXT_ANSWER, SYSTEM_INSTRUCTION};
pub use service::{QueryConfig, QueryService, DEFAULT_TOP_K};
