//! Interchange parser: runs a parse session over a whole input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::error::{GrammarError, ParseError};
use crate::grammar::{GrammarCatalog, ROOT_CODE};
use crate::options::ParserOptions;
use crate::output::OutputTree;
use crate::runtime::context::{ParseOutcome, ParseSession};

/// Grammar-driven parser for line-oriented interchanges.
///
/// Holds a shared, read-only grammar catalog and the options applied to each
/// parse. Every call to a `parse_*` method runs in its own [`ParseSession`],
/// so one parser can be reused (and shared between threads) freely.
///
/// # Example Flow
/// 1. Load the grammar catalog (segment rules, field templates, loop names)
/// 2. Create the parser; options default to the ones declared in the grammar
/// 3. Parse a file, reader or string into a [`ParseOutcome`]
#[derive(Debug, Clone)]
pub struct EdiParser {
    catalog: Arc<GrammarCatalog>,
    options: ParserOptions,
}

impl EdiParser {
    /// Create a parser using the options declared by the grammar.
    ///
    /// # Example
    /// ```ignore
    /// use fromedi::{EdiParser, GrammarCatalog};
    ///
    /// let catalog = GrammarCatalog::load_from_file("grammars/x12-4010.yaml")?;
    /// let parser = EdiParser::new(catalog);
    /// let outcome = parser.parse_file("po.edi")?;
    /// ```
    pub fn new(catalog: impl Into<Arc<GrammarCatalog>>) -> Self {
        let catalog = catalog.into();
        let options = catalog.options().clone();
        Self { catalog, options }
    }

    /// Replace the options taken from the grammar.
    ///
    /// # Errors
    /// Returns `GrammarError::Invalid` if the options cannot tokenize input,
    /// e.g. when the delimiter and the segment terminator are the same
    pub fn with_options(mut self, options: ParserOptions) -> Result<Self, GrammarError> {
        options.check().map_err(|reason| GrammarError::Invalid {
            path: "options".to_string(),
            reason,
        })?;
        self.options = options;
        Ok(self)
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn catalog(&self) -> &GrammarCatalog {
        &self.catalog
    }

    /// Start a session for incremental, caller-driven parsing.
    pub fn session(&self) -> ParseSession<'_> {
        ParseSession::new(&self.catalog, &self.options)
    }

    /// Parse a sequence of lines and return only the output tree.
    pub fn parse<I, S>(&self, lines: I) -> Result<OutputTree, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.parse_lines(lines).map(|outcome| outcome.tree)
    }

    /// Parse a sequence of lines.
    ///
    /// # Arguments
    /// * `lines` - Input lines in order; numbering starts at 1
    ///
    /// # Returns
    /// The output tree with any skipped segments and parse statistics
    ///
    /// # Errors
    /// Returns the first decoding failure, or the first unrecognized segment
    /// under the fail-fast policy
    pub fn parse_lines<I, S>(&self, lines: I) -> Result<ParseOutcome, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut session = self.session();
        for (index, line) in lines.into_iter().enumerate() {
            session.feed_line(index + 1, line.as_ref())?;
        }
        Ok(self.finish(session))
    }

    /// Parse a whole document held in memory.
    pub fn parse_str(&self, text: &str) -> Result<ParseOutcome, ParseError> {
        self.parse_lines(text.lines())
    }

    /// Parse from a buffered reader, line by line.
    ///
    /// # Errors
    /// Read failures are returned as `ParseErrorKind::Io` with the number of
    /// the line that could not be read
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> Result<ParseOutcome, ParseError> {
        let mut session = self.session();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ParseError::io(index + 1, session.scope_path(), e))?;
            session.feed_line(index + 1, &line)?;
        }
        Ok(self.finish(session))
    }

    /// Parse a file from disk.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ParseOutcome, ParseError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ParseError::io(0, vec![ROOT_CODE.to_string()], e))?;
        tracing::info!("Parsing {}", path.display());
        self.parse_reader(BufReader::new(file))
    }

    fn finish(&self, session: ParseSession<'_>) -> ParseOutcome {
        let outcome = session.finish();
        tracing::debug!(
            "parsed {} segments, max depth {}, {} skipped, open scopes: {:?}",
            outcome.segments,
            outcome.max_depth,
            outcome.skipped.len(),
            outcome.open_scopes
        );
        outcome
    }
}
