//! Venue extraction - turns free-form event prompts into structured contact
//! details.
//!
//! The model-backed path asks an LLM for strict JSON; the deterministic
//! heuristic path covers the model being unavailable or returning something
//! unusable. The two are merged per field, with the model winning whenever it
//! produced a value.
//!
//! The LLM is strictly an extractor here. It never decides which venue gets
//! called or what gets dispatched; those decisions live in the pipeline.

pub mod extractor;
pub mod heuristics;
pub mod llm;

pub use extractor::{FallbackReason, VenueExtractor};
pub use llm::{GeminiClient, LlmClient};
