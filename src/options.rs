//! Parser options: tokenization settings and the unrecognized-segment policy.
//!
//! Options can be declared in the `options` section of a grammar file and
//! overridden programmatically (the CLI does this for its flags).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do with a segment code that is neither legal in the active scope
/// nor explained by the end of an enclosing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrecognizedPolicy {
    /// Abort the parse with an `UnrecognizedSegment` error
    #[default]
    FailFast,
    /// Record the segment in the parse outcome and keep going
    Collect,
}

impl fmt::Display for UnrecognizedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnrecognizedPolicy::FailFast => write!(f, "fail_fast"),
            UnrecognizedPolicy::Collect => write!(f, "collect"),
        }
    }
}

impl FromStr for UnrecognizedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "fail_fast" | "fail" => Ok(UnrecognizedPolicy::FailFast),
            "collect" => Ok(UnrecognizedPolicy::Collect),
            other => Err(format!(
                "Unsupported unrecognized-segment policy: '{}'. Supported: fail_fast, collect",
                other
            )),
        }
    }
}

/// Settings for one parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserOptions {
    /// Field separator inside a segment
    pub delimiter: char,

    /// Segment terminator stripped from the end of each segment; a physical
    /// line holding several terminated segments is split on it
    pub segment_terminator: Option<char>,

    /// Handling of unrecognized segments
    pub unrecognized: UnrecognizedPolicy,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            delimiter: '*',
            segment_terminator: Some('~'),
            unrecognized: UnrecognizedPolicy::FailFast,
        }
    }
}

impl ParserOptions {
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_segment_terminator(mut self, terminator: Option<char>) -> Self {
        self.segment_terminator = terminator;
        self
    }

    pub fn with_policy(mut self, policy: UnrecognizedPolicy) -> Self {
        self.unrecognized = policy;
        self
    }

    /// Reject option combinations the tokenizer cannot honor.
    pub fn check(&self) -> Result<(), String> {
        if self.delimiter.is_whitespace() && self.delimiter != '\t' {
            return Err(format!("delimiter {:?} is whitespace", self.delimiter));
        }
        if self.segment_terminator == Some(self.delimiter) {
            return Err(format!(
                "segment terminator and delimiter are both {:?}",
                self.delimiter
            ));
        }
        Ok(())
    }
}
