//! Output tree produced by a parse.
//!
//! The tree is a nested, insertion-ordered record. Attribute values are either
//! plain text (decoded segment fields), nested records, or sequences of
//! records (loop repetitions). Locations inside the tree are addressed with
//! [`PathStep`] lists, resolved from the root.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered attribute map; one level of the output tree.
pub type Record = IndexMap<String, Node>;

/// Value stored under an attribute of a [`Record`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Node {
    Text(String),
    Sequence(Vec<Record>),
    Record(Record),
}

impl Node {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Record]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Node::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Text(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Text(value.to_string())
    }
}

/// One step of an attachment path from the tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// A named attribute (e.g. `transactions`)
    Key(String),
    /// A position in a sequence
    Index(usize),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Key(key) => write!(f, "{}", key),
            PathStep::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Render a path as `groups[0].transactions[1]`.
pub fn format_path(path: &[PathStep]) -> String {
    let mut out = String::new();
    for step in path {
        match step {
            PathStep::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathStep::Index(_) => out.push_str(&step.to_string()),
        }
    }
    out
}

/// The nested record structure built for one interchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputTree {
    root: Record,
}

impl OutputTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &Record {
        &self.root
    }

    pub fn into_record(self) -> Record {
        self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Follow `path` from the root and return the record it addresses.
    ///
    /// Returns `None` if any step is missing or lands on something other
    /// than a record.
    pub fn resolve(&self, path: &[PathStep]) -> Option<&Record> {
        let mut current = &self.root;
        let mut steps = path.iter();
        while let Some(step) = steps.next() {
            current = match step {
                PathStep::Key(key) => match current.get(key)? {
                    Node::Record(record) => record,
                    Node::Sequence(items) => match steps.next()? {
                        PathStep::Index(index) => items.get(*index)?,
                        PathStep::Key(_) => return None,
                    },
                    Node::Text(_) => return None,
                },
                PathStep::Index(_) => return None,
            };
        }
        Some(current)
    }

    /// Mutable variant of [`OutputTree::resolve`].
    pub fn resolve_mut(&mut self, path: &[PathStep]) -> Option<&mut Record> {
        let mut current = &mut self.root;
        let mut steps = path.iter();
        while let Some(step) = steps.next() {
            current = match step {
                PathStep::Key(key) => match current.get_mut(key)? {
                    Node::Record(record) => record,
                    Node::Sequence(items) => match steps.next()? {
                        PathStep::Index(index) => items.get_mut(*index)?,
                        PathStep::Key(_) => return None,
                    },
                    Node::Text(_) => return None,
                },
                PathStep::Index(_) => return None,
            };
        }
        Some(current)
    }

    /// Look up a text attribute by dotted path, e.g. `groups[0].transactions[1].po_number`.
    pub fn text_at(&self, dotted: &str) -> Option<&str> {
        let mut steps = parse_dotted(dotted);
        let leaf = match steps.pop()? {
            PathStep::Key(key) => key,
            PathStep::Index(_) => return None,
        };
        self.resolve(&steps)?.get(&leaf)?.as_text()
    }

    /// Number of records nested below the root along the deepest branch.
    pub fn depth(&self) -> usize {
        record_depth(&self.root)
    }
}

/// Merge decoded `fields` into `target`.
///
/// Text attributes that already exist are overwritten. Replacing a nested
/// record or a loop sequence is refused and the attribute name is returned
/// as the error; `target` is left untouched in that case.
pub fn merge_fields(target: &mut Record, fields: Record) -> Result<(), String> {
    if let Some(key) = fields
        .keys()
        .find(|key| matches!(target.get(*key), Some(Node::Record(_)) | Some(Node::Sequence(_))))
    {
        return Err(key.clone());
    }
    for (key, value) in fields {
        target.insert(key, value);
    }
    Ok(())
}

fn record_depth(record: &Record) -> usize {
    record
        .values()
        .map(|node| match node {
            Node::Text(_) => 0,
            Node::Record(inner) => 1 + record_depth(inner),
            Node::Sequence(items) => items.iter().map(|r| 1 + record_depth(r)).max().unwrap_or(0),
        })
        .max()
        .unwrap_or(0)
}

fn parse_dotted(dotted: &str) -> Vec<PathStep> {
    let mut steps = Vec::new();
    for part in dotted.split('.').filter(|s| !s.is_empty()) {
        let (name, indexes) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !name.is_empty() {
            steps.push(PathStep::Key(name.to_string()));
        }
        for index in indexes.split(']').filter(|s| !s.is_empty()) {
            if let Ok(index) = index.trim_start_matches('[').parse::<usize>() {
                steps.push(PathStep::Index(index));
            }
        }
    }
    steps
}
