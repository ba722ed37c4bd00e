//! Integration tests: the bundled X12 grammar against the fixture interchanges

use std::io::Write;
use std::path::PathBuf;

use fromedi::serialization::{write_tree, write_trees};
use fromedi::{
    EdiParser, GrammarCatalog, GrammarError, Node, OutputFormat, ParseErrorKind, ParserOptions,
    UnrecognizedPolicy,
};
use tempfile::NamedTempFile;

fn repo_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn x12_parser() -> EdiParser {
    let catalog = GrammarCatalog::load_from_file(repo_path("grammars/x12-4010.yaml")).unwrap();
    EdiParser::new(catalog)
}

#[test]
fn test_bundled_grammar_loads() {
    let catalog = GrammarCatalog::load_from_file(repo_path("grammars/x12-4010.yaml")).unwrap();

    assert_eq!(catalog.name(), Some("x12-4010"));
    assert!(catalog.missing_templates().is_empty());
    assert_eq!(catalog.loop_attribute_name("ST"), "transactions");
    assert_eq!(catalog.options().segment_terminator, Some('~'));
}

#[test]
fn test_purchase_order_tree() {
    let outcome = x12_parser()
        .parse_file(repo_path("tests/fixtures/purchase_order.edi"))
        .unwrap();
    let tree = &outcome.tree;

    assert_eq!(tree.text_at("control_number"), Some("000000101"));
    assert_eq!(tree.text_at("sender_id"), Some("BUYERCO        "));
    assert_eq!(tree.text_at("groups[0].functional_id"), Some("PO"));

    let order = "groups[0].transactions[0]";
    assert_eq!(tree.text_at(&format!("{}.set_id", order)), Some("850"));
    assert_eq!(tree.text_at(&format!("{}.po_number", order)), Some("PO-4471"));
    assert_eq!(tree.text_at(&format!("{}.DP", order)), Some("038"));
    assert_eq!(tree.text_at(&format!("{}.002", order)), Some("20240201"));
    assert_eq!(tree.text_at(&format!("{}.parties[0].city", order)), Some("Oakland"));
    assert_eq!(tree.text_at(&format!("{}.parties[1].address2", order)), Some("Suite 300"));
    assert_eq!(tree.text_at(&format!("{}.line_items[1].product_id", order)), Some("GAD-220"));
    assert_eq!(tree.text_at(&format!("{}.line_items[0].description", order)), Some("Blue widget"));
    assert_eq!(tree.text_at(&format!("{}.line_count", order)), Some("2"));

    assert_eq!(outcome.segments, 20);
    assert!(outcome.skipped.is_empty());
    assert!(outcome.open_scopes.is_empty());
}

#[test]
fn test_single_group_is_still_a_sequence() {
    let tree = x12_parser()
        .parse_file(repo_path("tests/fixtures/purchase_order.edi"))
        .unwrap()
        .tree;

    assert!(matches!(tree.root().get("groups"), Some(Node::Sequence(groups)) if groups.len() == 1));
}

#[test]
fn test_mixed_group_selects_grammar_per_transaction() {
    let outcome = x12_parser()
        .parse_file(repo_path("tests/fixtures/mixed_group.edi"))
        .unwrap();
    let tree = &outcome.tree;

    let transactions = tree.root()["groups"].as_sequence().unwrap()[0]["transactions"]
        .as_sequence()
        .unwrap();
    assert_eq!(transactions.len(), 2);

    assert_eq!(tree.text_at("groups[0].transactions[0].invoice_number"), Some("INV-9001"));
    assert_eq!(tree.text_at("groups[0].transactions[0].IA"), Some("V-5521"));
    assert_eq!(tree.text_at("groups[0].transactions[0].total_amount"), Some("10500"));
    assert_eq!(tree.text_at("groups[0].transactions[0].line_items[1].unit"), Some("CS"));
    assert_eq!(tree.text_at("groups[0].transactions[1].po_number"), Some("PO-4472"));
    assert_eq!(tree.text_at("groups[0].transactions[1].line_items[0].product_id"), Some("KIT-001"));
    assert_eq!(tree.text_at("groups[0].transactions[1].invoice_number"), None);

    assert!(outcome.open_scopes.is_empty());
}

#[test]
fn test_unknown_segment_fails_fast() {
    let err = x12_parser()
        .parse_file(repo_path("tests/fixtures/unknown_segment.edi"))
        .unwrap_err();

    assert!(err.is_unrecognized());
    assert_eq!(err.line, 5);
    assert_eq!(err.segment, "MSG");
    assert_eq!(err.scope_path, vec!["ROOT", "ISA", "GS", "ST", "ST:850"]);
    assert!(err.to_string().contains("ROOT > ISA > GS > ST > ST:850"));
}

#[test]
fn test_unknown_segment_collected() {
    let parser = x12_parser()
        .with_options(ParserOptions::default().with_policy(UnrecognizedPolicy::Collect))
        .unwrap();
    let outcome = parser
        .parse_file(repo_path("tests/fixtures/unknown_segment.edi"))
        .unwrap();

    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].code, "MSG");
    assert_eq!(outcome.skipped[0].line, 5);
    assert_eq!(
        outcome.tree.text_at("groups[0].transactions[0].line_items[0].product_id"),
        Some("BOLT-10")
    );
}

#[test]
fn test_unmapped_transaction_set() {
    let err = x12_parser()
        .parse_lines(vec!["ISA*00", "GS*SH", "ST*856*0001"])
        .unwrap_err();

    assert_eq!(err.line, 3);
    assert!(matches!(err.kind, ParseErrorKind::MissingGrammarDefinition { .. }));
    assert_eq!(err.scope_path, vec!["ROOT", "ISA", "GS"]);
}

#[test]
fn test_custom_delimiters() {
    let options = ParserOptions::default()
        .with_delimiter('|')
        .with_segment_terminator(None);
    let parser = x12_parser().with_options(options).unwrap();
    let tree = parser
        .parse(vec!["ISA|00", "GS|PO|BUYER", "ST|850|0009", "BEG|00|SA|PO-1"])
        .unwrap();

    assert_eq!(tree.text_at("groups[0].sender_code"), Some("BUYER"));
    assert_eq!(tree.text_at("groups[0].transactions[0].po_number"), Some("PO-1"));
}

#[test]
fn test_grammar_from_temp_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
templates:
  HDR: [batch]
  ROW: [id, value]
loop_names:
  ROW: rows
rules:
  HDR:
    children:
      ROW: {{ segtype: LOOP }}
"#
    )
    .unwrap();

    let catalog = GrammarCatalog::load_from_file(file.path()).unwrap();
    let tree = EdiParser::new(catalog)
        .parse(vec!["HDR*7", "ROW*1*a", "ROW*2*b"])
        .unwrap();

    assert_eq!(tree.text_at("batch"), Some("7"));
    assert_eq!(tree.text_at("rows[1].value"), Some("b"));
}

#[test]
fn test_invalid_grammar_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "rules:\n  REF: {{ segtype: KV_PAIR }}\n").unwrap();

    let err = GrammarCatalog::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, GrammarError::Invalid { .. }));

    let err = GrammarCatalog::load_from_file(repo_path("grammars/missing.yaml")).unwrap_err();
    assert!(matches!(err, GrammarError::Io { .. }));
}

#[test]
fn test_serialize_parsed_trees() {
    let parser = x12_parser();
    let first = parser
        .parse_file(repo_path("tests/fixtures/purchase_order.edi"))
        .unwrap()
        .tree;
    let second = parser
        .parse_file(repo_path("tests/fixtures/mixed_group.edi"))
        .unwrap()
        .tree;

    let mut json = Vec::new();
    write_tree(&mut json, &first, OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(value["groups"][0]["transactions"][0]["parties"][1]["name"], "Acme Corp");

    let mut lines = Vec::new();
    write_trees(&mut lines, &[first, second], OutputFormat::Ndjson).unwrap();
    let text = String::from_utf8(lines).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().nth(1).unwrap().contains("INV-9001"));
}
