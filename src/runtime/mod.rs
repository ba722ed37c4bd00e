//! Parsing engine.
//!
//! This module drives the grammar-scope automaton: one session per parse,
//! one scope stack per session, one segment at a time.

pub mod context;
pub mod parser;
pub mod scope;

// Re-export key types
pub use context::{ParseOutcome, ParseSession, SkippedSegment};
pub use parser::EdiParser;
pub use scope::{LoopSlot, ScopeFrame, ScopeStack};
