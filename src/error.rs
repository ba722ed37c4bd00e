//! Error types for grammar loading, segment decoding and parsing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning one segment's fields into a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The grammar accepts the segment but no field template names its fields.
    #[error("no field template defined for segment {code}")]
    UnknownSegmentTemplate { code: String },

    /// A key/value segment does not carry the key (or the value) it declares.
    #[error(
        "key/value segment {code} has {field_count} field(s), expected key at index {key_field_index} followed by a value"
    )]
    MalformedKeyValueSegment {
        code: String,
        key_field_index: usize,
        field_count: usize,
    },
}

/// Errors raised while loading or checking a grammar catalog.
#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("failed to read grammar file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse grammar YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid grammar at {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// What went wrong while parsing one segment.
#[derive(Error, Debug)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("segment is not recognized in the current scope")]
    UnrecognizedSegment,

    #[error("missing grammar definition: {detail}")]
    MissingGrammarDefinition { detail: String },

    /// Decoded fields would replace a loop sequence or nested record.
    #[error("attribute '{attribute}' already holds nested output")]
    AttributeConflict { attribute: String },

    /// The attachment path of the open scopes no longer resolves in the tree.
    #[error("attachment path '{path}' does not resolve to a record")]
    DetachedScope { path: String },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

/// A parse failure, located by line, segment code and scope path.
#[derive(Error, Debug)]
#[error("line {line}{} in scope {}: {kind}", describe_segment(.segment), .scope_path.join(" > "))]
pub struct ParseError {
    /// 1-based physical line number (0 when the failure is not tied to a line)
    pub line: usize,
    /// Normalized segment code of the offending segment
    pub segment: String,
    /// Segment codes of the open scopes, root first
    pub scope_path: Vec<String>,
    #[source]
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(
        line: usize,
        segment: impl Into<String>,
        scope_path: Vec<String>,
        kind: ParseErrorKind,
    ) -> Self {
        Self {
            line,
            segment: segment.into(),
            scope_path,
            kind,
        }
    }

    /// I/O failure while reading the source, before any segment is known.
    pub fn io(line: usize, scope_path: Vec<String>, err: std::io::Error) -> Self {
        Self::new(line, String::new(), scope_path, ParseErrorKind::Io(err))
    }

    pub fn is_unrecognized(&self) -> bool {
        matches!(self.kind, ParseErrorKind::UnrecognizedSegment)
    }
}

fn describe_segment(segment: &str) -> String {
    if segment.is_empty() {
        String::new()
    } else {
        format!(", segment \"{}\"", segment)
    }
}
