pub mod errors;
pub mod context;
pub mod store;
pub mod memory;
pub mod tokenizer;
pub mod parser;
pub mod registry;
pub mod cache;
pub mod dispatch;
pub mod engine;

pub use context::{ResolutionContext, Viewer};
pub use dispatch::ResolutionResult;
pub use engine::{EngineConfig, FilterOptions, TextFilter};
pub use errors::{FilterError, Result};
pub use memory::MemoryStore;
pub use tokenizer::Grammar;

/// Convenience: filter one piece of text with default settings.
///
/// Builds a throwaway [`TextFilter`], so nothing is cached between calls.
pub fn filter(ctx: ResolutionContext<'_>, text: &str) -> String {
    TextFilter::new(ctx, EngineConfig::default()).filter(text, &FilterOptions::default())
}
