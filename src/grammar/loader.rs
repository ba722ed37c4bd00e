//! Grammar catalog loader.
//!
//! Reads a grammar catalog from YAML, normalizes segment codes to upper case
//! and rejects rule trees the parsing engine cannot act on.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::{normalize_code, GrammarCatalog, RuleNode, SegType};
use crate::error::GrammarError;
use crate::options::ParserOptions;

/// On-disk layout of a grammar catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrammarFile {
    /// Informational name (e.g. `x12-4010`)
    #[serde(default)]
    pub name: Option<String>,

    /// Parser option defaults for documents in this grammar
    #[serde(default)]
    pub options: ParserOptions,

    /// Segment code -> positional attribute names
    #[serde(default)]
    pub templates: IndexMap<String, Vec<String>>,

    /// Segment code -> sequence attribute for loop repetitions
    #[serde(default)]
    pub loop_names: IndexMap<String, String>,

    /// Children of the root scope
    pub rules: IndexMap<String, RuleNode>,
}

impl GrammarCatalog {
    /// Load a grammar catalog from a YAML file.
    ///
    /// # Arguments
    /// * `path` - Path to the grammar YAML
    ///
    /// # Errors
    /// Returns error if the file can't be read, isn't valid YAML, or
    /// describes an inconsistent rule tree
    ///
    /// # Example
    /// ```ignore
    /// use fromedi::GrammarCatalog;
    ///
    /// let catalog = GrammarCatalog::load_from_file("grammars/x12-4010.yaml")?;
    /// println!("{} rules", catalog.rule_count());
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, GrammarError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|source| GrammarError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let catalog = Self::from_yaml_str(&contents)?;
        tracing::info!(
            "Loaded grammar {} from {} ({} rules)",
            catalog.name().unwrap_or("<unnamed>"),
            path.display(),
            catalog.rule_count()
        );
        Ok(catalog)
    }

    /// Parse a grammar catalog from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GrammarError> {
        let file: GrammarFile = serde_yaml::from_str(yaml)?;
        Self::from_file_model(file)
    }

    /// Build a catalog from an already deserialized [`GrammarFile`].
    pub fn from_file_model(file: GrammarFile) -> Result<Self, GrammarError> {
        file.options.check().map_err(|reason| GrammarError::Invalid {
            path: "options".to_string(),
            reason,
        })?;

        let mut catalog = Self::from_parts(file.rules, file.templates, file.loop_names)?
            .with_options(file.options);
        if let Some(name) = file.name {
            catalog = catalog.with_name(name);
        }
        Ok(catalog)
    }
}

/// Upper-case every segment code in `rule`'s subtree.
///
/// Conditional variant keys are field values, not segment codes, and keep
/// their spelling.
pub(crate) fn normalize_rule(rule: RuleNode, path: &str) -> Result<RuleNode, GrammarError> {
    let RuleNode {
        segtype,
        children,
        conditional_children,
        key_field_index,
    } = rule;

    let children = match children {
        Some(children) => {
            let mut normalized = IndexMap::with_capacity(children.len());
            for (code, child) in children {
                let code = normalize_code(&code);
                let child_path = format!("{}.{}", path, code);
                if code.is_empty() {
                    return Err(invalid(path, "empty segment code"));
                }
                if normalized.contains_key(&code) {
                    return Err(invalid(&child_path, "duplicate segment code"));
                }
                let child = normalize_rule(child, &child_path)?;
                normalized.insert(code, child);
            }
            Some(normalized)
        }
        None => None,
    };

    let conditional_children = match conditional_children {
        Some(mut conditional) => {
            let mut variants = IndexMap::with_capacity(conditional.variants.len());
            for (value, variant) in conditional.variants {
                let variant_path = format!("{}[{}]", path, value);
                variants.insert(value, normalize_rule(variant, &variant_path)?);
            }
            conditional.variants = variants;
            Some(conditional)
        }
        None => None,
    };

    Ok(RuleNode {
        segtype,
        children,
        conditional_children,
        key_field_index,
    })
}

/// Reject rule nodes whose options contradict their segment type.
pub(crate) fn check_rule(rule: &RuleNode, path: &str) -> Result<(), GrammarError> {
    match rule.segtype {
        SegType::KvPair => match rule.key_field_index {
            None => return Err(invalid(path, "KV_PAIR segment requires key_field_index")),
            Some(0) => {
                return Err(invalid(
                    path,
                    "key_field_index 0 is the segment code, not a key",
                ))
            }
            Some(_) => {
                if rule.opens_scope() {
                    return Err(invalid(path, "KV_PAIR segment cannot declare children"));
                }
            }
        },
        SegType::Closing => {
            if rule.children.is_some() || rule.conditional_children.is_some() {
                return Err(invalid(path, "CLOSING segment cannot declare children"));
            }
        }
        SegType::Regular | SegType::Loop => {}
    }

    if rule.segtype != SegType::KvPair && rule.key_field_index.is_some() {
        return Err(invalid(
            path,
            &format!("key_field_index is only valid for KV_PAIR, not {}", rule.segtype),
        ));
    }

    if let Some(conditional) = &rule.conditional_children {
        if conditional.field_index == 0 {
            return Err(invalid(
                path,
                "conditional_children.field_index 0 is the segment code",
            ));
        }
        if conditional.variants.is_empty() {
            return Err(invalid(path, "conditional_children declares no variants"));
        }
        for (value, variant) in &conditional.variants {
            check_rule(variant, &format!("{}[{}]", path, value))?;
        }
    }

    if let Some(children) = &rule.children {
        for (code, child) in children {
            check_rule(child, &format!("{}.{}", path, code))?;
        }
    }

    Ok(())
}

/// Upper-case the segment-code keys of a lookup table.
pub(crate) fn normalize_keys<V>(
    table: IndexMap<String, V>,
    section: &str,
) -> Result<IndexMap<String, V>, GrammarError> {
    let mut normalized = IndexMap::with_capacity(table.len());
    for (code, value) in table {
        let code = normalize_code(&code);
        if normalized.contains_key(&code) {
            return Err(invalid(&format!("{}.{}", section, code), "duplicate segment code"));
        }
        normalized.insert(code, value);
    }
    Ok(normalized)
}

fn invalid(path: &str, reason: &str) -> GrammarError {
    GrammarError::Invalid {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::UnrecognizedPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const GRAMMAR: &str = r#"
name: mini
options:
  delimiter: "|"
  unrecognized: collect
templates:
  isa: [sender, receiver]
  n1: [entity_id, name]
loop_names:
  n1: parties
rules:
  isa:
    children:
      n1:
        segtype: loop
      ref:
        segtype: KV_PAIR
        key_field_index: 1
      st:
        conditional_children:
          field_index: 1
          variants:
            "850":
              children:
                se: { segtype: CLOSING }
      iea:
        segtype: CLOSING
"#;

    fn assert_invalid(yaml: &str, needle: &str) {
        match GrammarCatalog::from_yaml_str(yaml) {
            Err(GrammarError::Invalid { path, reason }) => {
                let msg = format!("{}: {}", path, reason);
                assert!(msg.contains(needle), "'{}' does not mention '{}'", msg, needle);
            }
            other => panic!("expected invalid grammar, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_yaml_normalizes_codes() {
        let catalog = GrammarCatalog::from_yaml_str(GRAMMAR).unwrap();

        assert_eq!(catalog.name(), Some("mini"));
        let isa = catalog.lookup(catalog.root_rule(), "ISA").unwrap();
        assert_eq!(catalog.lookup(isa, "N1").unwrap().segtype, SegType::Loop);
        assert_eq!(catalog.lookup(isa, "REF").unwrap().key_field_index, Some(1));
        assert_eq!(catalog.field_template("N1").unwrap().len(), 2);
        assert_eq!(catalog.loop_attribute_name("N1"), "parties");

        let st = catalog.lookup(isa, "ST").unwrap();
        let variant = catalog.resolve_conditional(st, &["ST", "850"]).unwrap().unwrap();
        assert!(variant.child("SE").is_some());
    }

    #[test]
    fn test_load_reads_options() {
        let catalog = GrammarCatalog::from_yaml_str(GRAMMAR).unwrap();

        assert_eq!(catalog.options().delimiter, '|');
        assert_eq!(catalog.options().segment_terminator, Some('~'));
        assert_eq!(catalog.options().unrecognized, UnrecognizedPolicy::Collect);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(GRAMMAR.as_bytes()).unwrap();

        let catalog = GrammarCatalog::load_from_file(file.path()).unwrap();
        assert_eq!(catalog.rule_count(), 7);
    }

    #[test]
    fn test_load_missing_file() {
        let err = GrammarCatalog::load_from_file("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, GrammarError::Io { .. }));
        assert!(err.to_string().contains("does/not/exist.yaml"));
    }

    #[test]
    fn test_rejects_unknown_rule_option() {
        let err = GrammarCatalog::from_yaml_str("rules:\n  ISA:\n    subsegs: {}\n").unwrap_err();
        assert!(matches!(err, GrammarError::Yaml(_)));
    }

    #[test]
    fn test_rejects_kv_pair_without_key_index() {
        assert_invalid(
            "rules:\n  REF:\n    segtype: KV_PAIR\n",
            "ROOT.REF: KV_PAIR segment requires key_field_index",
        );
    }

    #[test]
    fn test_rejects_key_index_zero() {
        assert_invalid(
            "rules:\n  REF:\n    segtype: KV_PAIR\n    key_field_index: 0\n",
            "segment code",
        );
    }

    #[test]
    fn test_rejects_key_index_on_regular() {
        assert_invalid(
            "rules:\n  BEG:\n    key_field_index: 1\n",
            "only valid for KV_PAIR",
        );
    }

    #[test]
    fn test_rejects_closing_with_children() {
        assert_invalid(
            "rules:\n  SE:\n    segtype: CLOSING\n    children:\n      N1: {}\n",
            "CLOSING segment cannot declare children",
        );
    }

    #[test]
    fn test_rejects_duplicate_codes_after_normalization() {
        assert_invalid("rules:\n  ISA: {}\n  isa: {}\n", "duplicate segment code");
        assert_invalid(
            "templates:\n  N1: [a]\n  n1: [b]\nrules:\n  N1: {}\n",
            "templates.N1",
        );
    }

    #[test]
    fn test_rejects_empty_conditional_variants() {
        assert_invalid(
            "rules:\n  ST:\n    conditional_children:\n      field_index: 1\n      variants: {}\n",
            "no variants",
        );
    }

    #[test]
    fn test_rejects_clashing_options() {
        assert_invalid(
            "options:\n  delimiter: '~'\nrules:\n  ISA: {}\n",
            "options",
        );
    }
}
