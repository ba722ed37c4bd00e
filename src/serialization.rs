//! Serialization of output trees.
//!
//! Trees can be written as compact JSON, pretty JSON, YAML or NDJSON (one
//! tree per line). Several trees are written as a JSON array, a YAML
//! multi-document stream, or consecutive NDJSON lines.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;

use crate::output::OutputTree;

/// Error type for serialization operations
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output encodings supported for trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    JsonPretty,
    Yaml,
    Ndjson,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::JsonPretty => write!(f, "json-pretty"),
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Ndjson => write!(f, "ndjson"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "pretty" => Ok(OutputFormat::JsonPretty),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "ndjson" | "jsonl" => Ok(OutputFormat::Ndjson),
            other => Err(format!(
                "Unsupported output format: '{}'. Supported formats: json, json-pretty, yaml, ndjson",
                other
            )),
        }
    }
}

/// Write a single tree in `format`, followed by a newline.
pub fn write_tree<W: Write>(
    mut writer: W,
    tree: &OutputTree,
    format: OutputFormat,
) -> Result<(), SerializationError> {
    match format {
        OutputFormat::Json | OutputFormat::Ndjson => {
            serde_json::to_writer(&mut writer, tree)?;
            writeln!(writer)?;
        }
        OutputFormat::JsonPretty => {
            serde_json::to_writer_pretty(&mut writer, tree)?;
            writeln!(writer)?;
        }
        OutputFormat::Yaml => serde_yaml::to_writer(&mut writer, tree)?,
    }
    writer.flush()?;
    Ok(())
}

/// Write several trees in `format`.
///
/// JSON formats produce one array holding every tree, YAML a multi-document
/// stream, NDJSON one compact tree per line.
pub fn write_trees<W: Write>(
    mut writer: W,
    trees: &[OutputTree],
    format: OutputFormat,
) -> Result<(), SerializationError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer(&mut writer, trees)?;
            writeln!(writer)?;
        }
        OutputFormat::JsonPretty => {
            serde_json::to_writer_pretty(&mut writer, trees)?;
            writeln!(writer)?;
        }
        OutputFormat::Yaml => {
            for tree in trees {
                writeln!(writer, "---")?;
                serde_yaml::to_writer(&mut writer, tree)?;
            }
        }
        OutputFormat::Ndjson => {
            for tree in trees {
                serde_json::to_writer(&mut writer, tree)?;
                writeln!(writer)?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
