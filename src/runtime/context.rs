//! Parse session: the state of one in-flight parse.
//!
//! A session owns the scope stack and the output tree for exactly one
//! interchange. It borrows the grammar catalog read-only, so any number of
//! sessions can run against the same catalog. Sessions are created fresh per
//! parse and consumed by [`ParseSession::finish`].

use serde::{Deserialize, Serialize};

use crate::decoder::{decode_key_value, decode_positional};
use crate::error::{ParseError, ParseErrorKind};
use crate::grammar::{normalize_code, GrammarCatalog, RuleNode, SegType};
use crate::options::{ParserOptions, UnrecognizedPolicy};
use crate::output::{format_path, merge_fields, Node, OutputTree, PathStep, Record};
use crate::runtime::scope::{LoopSlot, ScopeFrame, ScopeStack};
use crate::tokenizer::Tokenizer;

/// A segment dropped under [`UnrecognizedPolicy::Collect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedSegment {
    pub line: usize,
    pub code: String,
    pub scope_path: Vec<String>,
}

/// Result of a completed parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcome {
    /// The output tree
    pub tree: OutputTree,

    /// Segments skipped under the collect policy, in input order
    #[serde(default)]
    pub skipped: Vec<SkippedSegment>,

    /// Number of segments processed (skipped ones included)
    pub segments: usize,

    /// Deepest scope nesting reached
    pub max_depth: usize,

    /// Scopes still open when the input ended, outermost first (root excluded)
    #[serde(default)]
    pub open_scopes: Vec<String>,
}

/// Mutable state of one parse.
///
/// Drive it with [`ParseSession::feed_line`] (or [`ParseSession::feed_fields`]
/// for pre-split input). After an error the session is left as it was
/// before the failing segment, so the partially built tree and the scope path
/// can still be inspected.
#[derive(Debug)]
pub struct ParseSession<'g> {
    catalog: &'g GrammarCatalog,
    tokenizer: Tokenizer,
    policy: UnrecognizedPolicy,
    scopes: ScopeStack<'g>,
    tree: OutputTree,
    skipped: Vec<SkippedSegment>,
    segments: usize,
    max_depth: usize,
}

impl<'g> ParseSession<'g> {
    /// Create a session with an empty tree and only the root scope open.
    ///
    /// # Arguments
    /// * `catalog` - Grammar catalog consulted for every segment
    /// * `options` - Tokenizer settings and unrecognized-segment policy
    pub fn new(catalog: &'g GrammarCatalog, options: &ParserOptions) -> Self {
        Self {
            catalog,
            tokenizer: Tokenizer::from_options(options),
            policy: options.unrecognized,
            scopes: ScopeStack::new(catalog.root_rule()),
            tree: OutputTree::new(),
            skipped: Vec::new(),
            segments: 0,
            max_depth: 0,
        }
    }

    /// Process one physical input line.
    ///
    /// # Arguments
    /// * `line` - 1-based line number, used in diagnostics
    /// * `raw` - Line text; may hold several terminated segments or none
    pub fn feed_line(&mut self, line: usize, raw: &str) -> Result<(), ParseError> {
        let tokenizer = self.tokenizer;
        let segments = tokenizer.segments(raw);
        if segments.is_empty() {
            tracing::trace!("line {}: blank, skipped", line);
            return Ok(());
        }

        for segment in segments {
            let fields = tokenizer.fields(segment);
            self.feed_fields(line, &fields)?;
        }
        Ok(())
    }

    /// Process one segment given as its fields (field 0 is the code).
    pub fn feed_fields(&mut self, line: usize, fields: &[&str]) -> Result<(), ParseError> {
        let code = match fields.first() {
            Some(code) => normalize_code(code),
            None => return Ok(()),
        };
        self.segments += 1;
        tracing::debug!("line {}: segment {} ({} fields)", line, code, fields.len());

        let (exits, rule) = match self.locate(&code) {
            Ok(found) => found,
            Err(exits) => return self.unrecognized(line, &code, exits),
        };

        // Every loop scope between the top and the accepting scope ends here.
        for _ in 0..exits {
            if let Some(frame) = self.scopes.pop() {
                tracing::debug!(
                    "[{}] end of loop {}, back to {}",
                    code,
                    frame.label,
                    self.scopes.active().label
                );
            }
        }

        self.apply(line, &code, rule, fields)
    }

    /// Find the rule for `code`, walking outwards through loop scopes that
    /// do not accept it.
    ///
    /// # Returns
    /// * `Ok((exits, rule))` - the number of loop scopes to leave and the
    ///   matched rule
    /// * `Err(exits)` - nothing accepts `code`; `exits` loop scopes end before
    ///   the scope that rejects it
    fn locate(&self, code: &str) -> Result<(usize, &'g RuleNode), usize> {
        let catalog = self.catalog;
        let mut exits = 0;
        while let Some(frame) = self.scopes.nth_from_top(exits) {
            let rule: &'g RuleNode = frame.rule;
            if let Some(found) = catalog.lookup(rule, code) {
                return Ok((exits, found));
            }
            if !frame.is_loop() {
                break;
            }
            exits += 1;
        }
        Err(exits)
    }

    fn apply(
        &mut self,
        line: usize,
        code: &str,
        rule: &'g RuleNode,
        fields: &[&str],
    ) -> Result<(), ParseError> {
        match rule.segtype {
            SegType::Regular | SegType::Loop => self.apply_positional(line, code, rule, fields),
            SegType::Closing => self.apply_closing(line, code),
            SegType::KvPair => self.apply_key_value(line, code, rule, fields),
        }
    }

    fn apply_positional(
        &mut self,
        line: usize,
        code: &str,
        rule: &'g RuleNode,
        fields: &[&str],
    ) -> Result<(), ParseError> {
        let catalog = self.catalog;
        let decoded = decode_positional(code, fields, catalog)
            .map_err(|e| self.error(line, code, e.into()))?;
        let variant = catalog
            .resolve_conditional(rule, fields)
            .map_err(|detail| {
                self.error(line, code, ParseErrorKind::MissingGrammarDefinition { detail })
            })?;

        let slot = match rule.segtype {
            SegType::Loop => Some(self.open_repetition(line, code)?),
            _ => None,
        };

        let mut path = self.scopes.attachment_path();
        if let Some(slot) = &slot {
            path.extend(slot.steps());
        }
        self.merge_at(line, code, &path, decoded)?;

        if rule.opens_scope() {
            tracing::debug!("[{}] opens {} scope at '{}'", code, rule.segtype, format_path(&path));
            self.scopes.push(ScopeFrame::new(code, rule, slot));

            if let Some(variant) = variant {
                let value = rule
                    .conditional_children
                    .as_ref()
                    .and_then(|c| fields.get(c.field_index))
                    .map(|v| v.trim())
                    .unwrap_or_default();
                let label = format!("{}:{}", code, value);
                tracing::debug!("[{}] conditional scope {}", code, label);
                self.scopes.push(ScopeFrame::new(label, variant, None));
            }

            self.max_depth = self.max_depth.max(self.scopes.depth());
        }
        Ok(())
    }

    /// Append a fresh element to the loop sequence for `code` on the current
    /// attachment record, creating the sequence on first use.
    fn open_repetition(&mut self, line: usize, code: &str) -> Result<LoopSlot, ParseError> {
        let attribute = self.catalog.loop_attribute_name(code);
        let path = self.scopes.attachment_path();

        let opened = match self.tree.resolve_mut(&path) {
            Some(parent) => {
                let entry = parent
                    .entry(attribute.clone())
                    .or_insert_with(|| Node::Sequence(Vec::new()));
                match entry {
                    Node::Sequence(items) => {
                        items.push(Record::new());
                        Ok(items.len() - 1)
                    }
                    _ => Err(ParseErrorKind::AttributeConflict {
                        attribute: attribute.clone(),
                    }),
                }
            }
            None => Err(ParseErrorKind::DetachedScope {
                path: format_path(&path),
            }),
        };

        let index = opened.map_err(|kind| self.error(line, code, kind))?;
        tracing::debug!("[{}] repetition {} of '{}'", code, index, attribute);
        Ok(LoopSlot { attribute, index })
    }

    fn apply_closing(&mut self, line: usize, code: &str) -> Result<(), ParseError> {
        match self.scopes.pop() {
            Some(frame) => {
                match &frame.slot {
                    Some(slot) => tracing::debug!(
                        "[{}] closes loop scope {} and releases '{}[{}]'",
                        code,
                        frame.label,
                        slot.attribute,
                        slot.index
                    ),
                    None => tracing::debug!("[{}] closes scope {}", code, frame.label),
                }
                Ok(())
            }
            None => self.unrecognized(line, code, 0),
        }
    }

    fn apply_key_value(
        &mut self,
        line: usize,
        code: &str,
        rule: &'g RuleNode,
        fields: &[&str],
    ) -> Result<(), ParseError> {
        let key_field_index = rule.key_field_index.ok_or_else(|| {
            self.error(
                line,
                code,
                ParseErrorKind::MissingGrammarDefinition {
                    detail: format!("KV_PAIR segment {} declares no key_field_index", code),
                },
            )
        })?;

        let decoded = decode_key_value(code, fields, key_field_index)
            .map_err(|e| self.error(line, code, e.into()))?;
        let path = self.scopes.attachment_path();
        self.merge_at(line, code, &path, decoded)
    }

    fn merge_at(
        &mut self,
        line: usize,
        code: &str,
        path: &[PathStep],
        fields: Record,
    ) -> Result<(), ParseError> {
        let merged = match self.tree.resolve_mut(path) {
            Some(target) => merge_fields(target, fields)
                .map_err(|attribute| ParseErrorKind::AttributeConflict { attribute }),
            None => Err(ParseErrorKind::DetachedScope {
                path: format_path(path),
            }),
        };
        merged.map_err(|kind| self.error(line, code, kind))
    }

    /// Handle a segment no open scope accepts. The `exits` loop scopes above
    /// the rejecting scope have ended; under the collect policy they are
    /// closed before the segment is recorded, under fail-fast the session is
    /// left as it was.
    fn unrecognized(&mut self, line: usize, code: &str, exits: usize) -> Result<(), ParseError> {
        let mut scope_path = self.scopes.rule_path();
        scope_path.truncate(scope_path.len().saturating_sub(exits).max(1));

        match self.policy {
            UnrecognizedPolicy::FailFast => Err(ParseError::new(
                line,
                code,
                scope_path,
                ParseErrorKind::UnrecognizedSegment,
            )),
            UnrecognizedPolicy::Collect => {
                for _ in 0..exits {
                    if let Some(frame) = self.scopes.pop() {
                        tracing::debug!("[{}] end of loop {}", code, frame.label);
                    }
                }
                tracing::warn!(
                    "line {}: skipping segment {} not recognized in scope {}",
                    line,
                    code,
                    scope_path.join(" > ")
                );
                self.skipped.push(SkippedSegment {
                    line,
                    code: code.to_string(),
                    scope_path,
                });
                Ok(())
            }
        }
    }

    fn error(&self, line: usize, code: &str, kind: ParseErrorKind) -> ParseError {
        ParseError::new(line, code, self.scopes.rule_path(), kind)
    }

    /// Tree built so far.
    pub fn tree(&self) -> &OutputTree {
        &self.tree
    }

    /// Labels of the open scopes, root first.
    pub fn scope_path(&self) -> Vec<String> {
        self.scopes.rule_path()
    }

    /// Path to the record currently being populated.
    pub fn attachment_path(&self) -> Vec<PathStep> {
        self.scopes.attachment_path()
    }

    /// Current scope nesting depth (0 = root only).
    pub fn depth(&self) -> usize {
        self.scopes.depth()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn skipped(&self) -> &[SkippedSegment] {
        &self.skipped
    }

    pub fn segment_count(&self) -> usize {
        self.segments
    }

    /// End the session. Open scopes are left open, not closed.
    pub fn finish(self) -> ParseOutcome {
        let open_scopes = self.scopes.rule_path().into_iter().skip(1).collect();
        ParseOutcome {
            tree: self.tree,
            skipped: self.skipped,
            segments: self.segments,
            max_depth: self.max_depth,
            open_scopes,
        }
    }
}
