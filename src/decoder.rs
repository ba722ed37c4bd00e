//! Segment decoders: turn a segment's fields into a flat record.
//!
//! Two shapes exist. Positional segments pair a field template with the
//! fields after the segment code. Key/value segments carry their own
//! attribute name in one field and its value in the next.

use crate::error::DecodeError;
use crate::grammar::GrammarCatalog;
use crate::output::{Node, Record};

/// Decode a positional segment using its field template.
///
/// Template names are paired with fields starting at index 1. A segment may
/// supply fewer fields than the template names; trailing attributes are then
/// omitted. Fields beyond the template are dropped.
///
/// # Arguments
/// * `code` - Normalized segment code
/// * `fields` - All fields of the segment, code included
/// * `catalog` - Source of the field template
///
/// # Errors
/// Returns `UnknownSegmentTemplate` if the catalog has no template for `code`
pub fn decode_positional(
    code: &str,
    fields: &[&str],
    catalog: &GrammarCatalog,
) -> Result<Record, DecodeError> {
    let template = catalog
        .field_template(code)
        .ok_or_else(|| DecodeError::UnknownSegmentTemplate {
            code: code.to_string(),
        })?;

    let values = fields.get(1..).unwrap_or_default();
    if values.len() > template.len() {
        tracing::trace!(
            "[{}] ignoring {} field(s) beyond its template",
            code,
            values.len() - template.len()
        );
    }

    Ok(template
        .iter()
        .zip(values)
        .map(|(name, value)| (name.clone(), Node::from(*value)))
        .collect())
}

/// Decode a key/value segment such as `REF*PO*12345`.
///
/// The field at `key_field_index` names the attribute. The value is the field
/// right after the key; when the key is the last field, the value is the one
/// remaining field other than the code and the key. Positions are used
/// throughout, so a value equal to its key is handled like any other.
///
/// # Errors
/// Returns `MalformedKeyValueSegment` if the key or the value is missing
pub fn decode_key_value(
    code: &str,
    fields: &[&str],
    key_field_index: usize,
) -> Result<Record, DecodeError> {
    let malformed = || DecodeError::MalformedKeyValueSegment {
        code: code.to_string(),
        key_field_index,
        field_count: fields.len(),
    };

    if key_field_index == 0 || fields.len() < key_field_index + 1 {
        return Err(malformed());
    }
    let key = fields[key_field_index];

    let value = match fields.get(key_field_index + 1) {
        Some(value) => *value,
        None => {
            let mut rest = fields
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != 0 && *i != key_field_index)
                .map(|(_, field)| *field);
            match (rest.next(), rest.next()) {
                (Some(value), None) => value,
                _ => return Err(malformed()),
            }
        }
    };

    let mut record = Record::new();
    record.insert(key.to_string(), Node::from(value));
    Ok(record)
}
