//! # fromedi: grammar-driven EDI interchange parsing
//!
//! fromedi converts a line-oriented, field-delimited interchange (X12-style
//! segments such as `N1*ST*Acme Corp~`) into a nested record tree. What is
//! legal where, how segments nest, and how fields are named is declared in a
//! grammar catalog rather than in code.
//!
//! ## Features
//!
//! - **Declarative grammar**: segment scopes, loops, closing segments,
//!   key/value segments and runtime-selected (conditional) scopes, loaded
//!   from YAML
//! - **Implicit loop termination**: a loop ends when a segment it does not
//!   recognize arrives; the segment is then matched against the enclosing scope
//! - **Explicit unrecognized-segment policy**: fail fast (default) or collect
//!   and continue
//! - **Ordered output**: attributes keep the order they were decoded in;
//!   loop repetitions are always sequences
//!
//! ## Example: grammar
//!
//! ```yaml
//! templates:
//!   ISA: [sender_id, receiver_id]
//!   N1: [entity_id, name]
//! loop_names:
//!   N1: parties
//! rules:
//!   ISA:
//!     children:
//!       N1: { segtype: LOOP }
//!       IEA: { segtype: CLOSING }
//! ```
//!
//! ## Example: parsing
//!
//! ```ignore
//! use fromedi::{EdiParser, GrammarCatalog};
//!
//! let catalog = GrammarCatalog::load_from_file("grammars/x12-4010.yaml")?;
//! let parser = EdiParser::new(catalog);
//! let outcome = parser.parse_file("po.edi")?;
//! println!("{}", serde_json::to_string_pretty(&outcome.tree)?);
//! ```

// Core modules
pub mod error;
pub mod grammar;
pub mod options;
pub mod output;
pub mod tokenizer;
pub mod decoder;
pub mod serialization;

// Parsing engine
pub mod runtime;

// Re-export key types
pub use error::{DecodeError, GrammarError, ParseError, ParseErrorKind};
pub use grammar::{ConditionalChildren, GrammarCatalog, RuleNode, SegType};
pub use options::{ParserOptions, UnrecognizedPolicy};
pub use output::{Node, OutputTree, PathStep, Record};
pub use tokenizer::Tokenizer;
pub use serialization::{OutputFormat, SerializationError};

// Re-export runtime types
pub use runtime::{EdiParser, ParseOutcome, ParseSession, SkippedSegment};
