//! Grammar catalog: which segment codes are legal in which scope, how scopes
//! nest, and how each segment's fields are named.
//!
//! A catalog is immutable once built and may be shared read-only between any
//! number of parses.

pub mod loader;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GrammarError;
use crate::options::ParserOptions;

pub use loader::GrammarFile;

/// Segment code reported for the implicit root scope.
pub const ROOT_CODE: &str = "ROOT";

/// Classification of a segment within its parent scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegType {
    /// Fields are merged into the current record
    #[default]
    #[serde(alias = "regular")]
    Regular,
    /// Each occurrence opens a new element of a sequence attribute
    #[serde(alias = "loop")]
    Loop,
    /// Ends the innermost open scope
    #[serde(alias = "closing")]
    Closing,
    /// One field names the attribute, the following field is its value
    #[serde(alias = "kv_pair")]
    KvPair,
}

impl fmt::Display for SegType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegType::Regular => write!(f, "REGULAR"),
            SegType::Loop => write!(f, "LOOP"),
            SegType::Closing => write!(f, "CLOSING"),
            SegType::KvPair => write!(f, "KV_PAIR"),
        }
    }
}

/// Scope selection driven by one field of the opening segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalChildren {
    /// Position of the discriminant field (0 is the segment code)
    pub field_index: usize,

    /// Discriminant value -> rule node whose children form the scope
    pub variants: IndexMap<String, RuleNode>,
}

/// Grammar entry for one segment code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleNode {
    #[serde(default)]
    pub segtype: SegType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<IndexMap<String, RuleNode>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_children: Option<ConditionalChildren>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_field_index: Option<usize>,
}

impl RuleNode {
    pub fn new(segtype: SegType) -> Self {
        Self {
            segtype,
            ..Self::default()
        }
    }

    pub fn regular() -> Self {
        Self::new(SegType::Regular)
    }

    pub fn looped() -> Self {
        Self::new(SegType::Loop)
    }

    pub fn closing() -> Self {
        Self::new(SegType::Closing)
    }

    pub fn kv_pair(key_field_index: usize) -> Self {
        Self {
            key_field_index: Some(key_field_index),
            ..Self::new(SegType::KvPair)
        }
    }

    /// Add a child rule; the code is normalized to upper case.
    pub fn with_child(mut self, code: &str, child: RuleNode) -> Self {
        self.children
            .get_or_insert_with(IndexMap::new)
            .insert(normalize_code(code), child);
        self
    }

    pub fn with_conditional(mut self, field_index: usize, variants: Vec<(&str, RuleNode)>) -> Self {
        self.conditional_children = Some(ConditionalChildren {
            field_index,
            variants: variants
                .into_iter()
                .map(|(value, node)| (value.to_string(), node))
                .collect(),
        });
        self
    }

    /// Whether a segment matching this rule opens a scope of its own.
    pub fn opens_scope(&self) -> bool {
        self.segtype == SegType::Loop
            || self.children.is_some()
            || self.conditional_children.is_some()
    }

    pub fn child(&self, code: &str) -> Option<&RuleNode> {
        self.children.as_ref()?.get(code)
    }
}

/// Upper-case form used for every segment code lookup.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Immutable lookup tables consulted by the parsing engine.
#[derive(Debug, Clone, PartialEq)]
pub struct GrammarCatalog {
    name: Option<String>,
    root: RuleNode,
    templates: IndexMap<String, Vec<String>>,
    loop_names: IndexMap<String, String>,
    options: ParserOptions,
}

impl GrammarCatalog {
    /// Build a catalog from its parts, normalizing codes and running the
    /// static checks.
    ///
    /// # Arguments
    /// * `rules` - Children of the root scope
    /// * `templates` - Segment code -> positional attribute names
    /// * `loop_names` - Segment code -> sequence attribute name
    ///
    /// # Errors
    /// Returns `GrammarError::Invalid` if the rule tree is inconsistent
    pub fn from_parts(
        rules: IndexMap<String, RuleNode>,
        templates: IndexMap<String, Vec<String>>,
        loop_names: IndexMap<String, String>,
    ) -> Result<Self, GrammarError> {
        let root = loader::normalize_rule(
            RuleNode {
                children: Some(rules),
                ..RuleNode::regular()
            },
            ROOT_CODE,
        )?;
        loader::check_rule(&root, ROOT_CODE)?;

        Ok(Self {
            name: None,
            root,
            templates: loader::normalize_keys(templates, "templates")?,
            loop_names: loader::normalize_keys(loop_names, "loop_names")?,
            options: ParserOptions::default(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_template(mut self, code: &str, attributes: &[&str]) -> Self {
        self.templates.insert(
            normalize_code(code),
            attributes.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_loop_name(mut self, code: &str, name: &str) -> Self {
        self.loop_names.insert(normalize_code(code), name.to_string());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Parser options declared alongside the grammar.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// The implicit rule whose children are the top-level segments.
    pub fn root_rule(&self) -> &RuleNode {
        &self.root
    }

    /// Child rule for `code` within the scope of `rule`.
    pub fn lookup<'a>(&'a self, rule: &'a RuleNode, code: &str) -> Option<&'a RuleNode> {
        rule.child(code)
    }

    pub fn segtype_of(&self, rule: &RuleNode) -> SegType {
        rule.segtype
    }

    pub fn field_template(&self, code: &str) -> Option<&[String]> {
        self.templates.get(code).map(|t| t.as_slice())
    }

    /// Attribute holding the repetitions of loop segment `code`.
    pub fn loop_attribute_name(&self, code: &str) -> String {
        self.loop_names
            .get(code)
            .cloned()
            .unwrap_or_else(|| format!("{}s", code))
    }

    /// Resolve the variant scope selected by the discriminant field of a
    /// segment matching `rule`.
    ///
    /// # Returns
    /// * `Ok(None)` - `rule` has no conditional children
    /// * `Ok(Some(variant))` - the variant for the field's value
    /// * `Err(detail)` - the field is absent or its value has no variant
    pub fn resolve_conditional<'a>(
        &'a self,
        rule: &'a RuleNode,
        fields: &[&str],
    ) -> Result<Option<&'a RuleNode>, String> {
        let conditional = match &rule.conditional_children {
            Some(conditional) => conditional,
            None => return Ok(None),
        };

        let value = fields.get(conditional.field_index).ok_or_else(|| {
            format!(
                "discriminant field {} is absent ({} field(s) supplied)",
                conditional.field_index,
                fields.len()
            )
        })?;

        conditional
            .variants
            .get(value.trim())
            .map(Some)
            .ok_or_else(|| {
                format!(
                    "no conditional scope for value '{}' at field {} (known: {})",
                    value,
                    conditional.field_index,
                    conditional
                        .variants
                        .keys()
                        .map(|k| k.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }

    /// Codes of REGULAR and LOOP segments that have no field template.
    ///
    /// Such segments fail with `UnknownSegmentTemplate` when they are parsed.
    pub fn missing_templates(&self) -> Vec<String> {
        let mut missing = Vec::new();
        self.collect_missing_templates(&self.root, &mut missing);
        missing
    }

    fn collect_missing_templates(&self, rule: &RuleNode, missing: &mut Vec<String>) {
        if let Some(children) = &rule.children {
            for (code, child) in children {
                if matches!(child.segtype, SegType::Regular | SegType::Loop)
                    && !self.templates.contains_key(code)
                    && !missing.contains(code)
                {
                    missing.push(code.clone());
                }
                self.collect_missing_templates(child, missing);
            }
        }
        if let Some(conditional) = &rule.conditional_children {
            for variant in conditional.variants.values() {
                self.collect_missing_templates(variant, missing);
            }
        }
    }

    /// Number of rule nodes below the root, conditional variants included.
    pub fn rule_count(&self) -> usize {
        count_rules(&self.root)
    }
}

fn count_rules(rule: &RuleNode) -> usize {
    let children: usize = rule
        .children
        .iter()
        .flat_map(|c| c.values())
        .map(|child| 1 + count_rules(child))
        .sum();
    let variants: usize = rule
        .conditional_children
        .iter()
        .flat_map(|c| c.variants.values())
        .map(|variant| 1 + count_rules(variant))
        .sum();
    children + variants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> GrammarCatalog {
        let mut rules = IndexMap::new();
        rules.insert(
            "isa".to_string(),
            RuleNode::regular().with_child(
                "GS",
                RuleNode::looped()
                    .with_child("ST", RuleNode::looped().with_conditional(
                        1,
                        vec![
                            ("810", RuleNode::regular().with_child("BIG", RuleNode::regular())),
                            ("850", RuleNode::regular().with_child("BEG", RuleNode::regular())),
                        ],
                    ))
                    .with_child("GE", RuleNode::regular()),
            ),
        );

        GrammarCatalog::from_parts(rules, IndexMap::new(), IndexMap::new())
            .unwrap()
            .with_template("ISA", &["sender"])
            .with_template("GS", &["functional_id"])
            .with_template("ST", &["set_id", "control_number"])
            .with_template("BEG", &["purpose"])
            .with_loop_name("GS", "groups")
    }

    #[test]
    fn test_codes_are_normalized() {
        let catalog = catalog();
        let isa = catalog.lookup(catalog.root_rule(), "ISA");

        assert!(isa.is_some());
        assert!(catalog.lookup(catalog.root_rule(), "isa").is_none());
        assert_eq!(catalog.segtype_of(isa.unwrap()), SegType::Regular);
    }

    #[test]
    fn test_loop_attribute_name_falls_back_to_plural_code() {
        let catalog = catalog();

        assert_eq!(catalog.loop_attribute_name("GS"), "groups");
        assert_eq!(catalog.loop_attribute_name("ST"), "STs");
    }

    #[test]
    fn test_field_template() {
        let catalog = catalog();

        assert_eq!(
            catalog.field_template("ST"),
            Some(&["set_id".to_string(), "control_number".to_string()][..])
        );
        assert!(catalog.field_template("SE").is_none());
    }

    #[test]
    fn test_resolve_conditional() {
        let catalog = catalog();
        let gs = catalog.lookup(catalog.root_rule(), "ISA").unwrap().child("GS").unwrap();
        let st = gs.child("ST").unwrap();

        let invoice = catalog.resolve_conditional(st, &["ST", "810", "0001"]).unwrap().unwrap();
        assert!(invoice.child("BIG").is_some());

        let order = catalog.resolve_conditional(st, &["ST", "850", "0002"]).unwrap().unwrap();
        assert!(order.child("BEG").is_some());

        let unknown = catalog.resolve_conditional(st, &["ST", "997"]).unwrap_err();
        assert!(unknown.contains("'997'"));

        let absent = catalog.resolve_conditional(st, &["ST"]).unwrap_err();
        assert!(absent.contains("absent"));

        assert_eq!(catalog.resolve_conditional(gs, &["GS", "PO"]), Ok(None));
    }

    #[test]
    fn test_missing_templates_lists_regular_and_loop_codes() {
        let missing = catalog().missing_templates();

        assert_eq!(missing, vec!["BIG".to_string(), "GE".to_string()]);
    }

    #[test]
    fn test_opens_scope() {
        assert!(RuleNode::looped().opens_scope());
        assert!(!RuleNode::regular().opens_scope());
        assert!(RuleNode::regular().with_child("N1", RuleNode::regular()).opens_scope());
        assert!(!RuleNode::kv_pair(1).opens_scope());
    }

    #[test]
    fn test_rule_count() {
        // ISA, GS, ST, 810, BIG, 850, BEG, GE
        assert_eq!(catalog().rule_count(), 8);
    }
}
