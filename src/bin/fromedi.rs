//! fromedi CLI - convert EDI interchanges into nested records using a YAML grammar
//!
//! Parses one or more interchange files against a grammar catalog and writes
//! the resulting trees as JSON, YAML or NDJSON.

use clap::{ArgAction, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use fromedi::serialization::{write_tree, write_trees};
use fromedi::{EdiParser, GrammarCatalog, OutputFormat, OutputTree, UnrecognizedPolicy};

#[derive(Parser)]
#[command(name = "fromedi")]
#[command(version, about = "Grammar-driven conversion of EDI interchanges into nested records", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse interchange files into nested records
    Parse {
        /// Path to the grammar catalog YAML
        #[arg(short, long)]
        grammar: PathBuf,

        /// Interchange files to parse
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output format (json, json-pretty, yaml, ndjson)
        #[arg(short, long, default_value = "json-pretty")]
        format: OutputFormat,

        /// Field delimiter - overrides the grammar's options
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Segment terminator - overrides the grammar's options
        #[arg(short, long, conflicts_with = "no_terminator")]
        terminator: Option<char>,

        /// Treat each line as exactly one segment, without a terminator
        #[arg(long)]
        no_terminator: bool,

        /// Skip unrecognized segments and report them instead of failing
        #[arg(long)]
        collect_unrecognized: bool,

        /// Write output to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load and check a grammar catalog without parsing anything
    Validate {
        /// Path to the grammar catalog YAML
        #[arg(short, long)]
        grammar: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Parse {
            grammar,
            inputs,
            format,
            delimiter,
            terminator,
            no_terminator,
            collect_unrecognized,
            output,
        } => parse_inputs(ParseArgs {
            grammar,
            inputs,
            format,
            delimiter,
            terminator,
            no_terminator,
            collect_unrecognized,
            output,
        }),
        Commands::Validate { grammar } => validate_grammar(grammar),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

struct ParseArgs {
    grammar: PathBuf,
    inputs: Vec<PathBuf>,
    format: OutputFormat,
    delimiter: Option<char>,
    terminator: Option<char>,
    no_terminator: bool,
    collect_unrecognized: bool,
    output: Option<PathBuf>,
}

/// Parse every input file and write the trees
fn parse_inputs(args: ParseArgs) -> Result<(), String> {
    let catalog = GrammarCatalog::load_from_file(&args.grammar)
        .map_err(|e| format!("Failed to load grammar: {}", e))?;

    let mut options = catalog.options().clone();
    if let Some(delimiter) = args.delimiter {
        options = options.with_delimiter(delimiter);
    }
    if args.no_terminator {
        options = options.with_segment_terminator(None);
    } else if let Some(terminator) = args.terminator {
        options = options.with_segment_terminator(Some(terminator));
    }
    if args.collect_unrecognized {
        options = options.with_policy(UnrecognizedPolicy::Collect);
    }
    let parser = EdiParser::new(catalog)
        .with_options(options)
        .map_err(|e| format!("Invalid parser options: {}", e))?;

    let mut trees: Vec<OutputTree> = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        let outcome = parser
            .parse_file(input)
            .map_err(|e| format!("{}: {}", input.display(), e))?;

        for skipped in &outcome.skipped {
            eprintln!(
                "  ⚠ {}:{}: skipped unrecognized segment {} in scope {}",
                input.display(),
                skipped.line,
                skipped.code,
                skipped.scope_path.join(" > ")
            );
        }
        tracing::info!(
            "{}: {} segments, max depth {}",
            input.display(),
            outcome.segments,
            outcome.max_depth
        );
        trees.push(outcome.tree);
    }

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).map_err(|e| format!("Failed to create {}: {}", path.display(), e))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let written = match trees.as_slice() {
        [tree] => write_tree(writer, tree, args.format),
        _ => write_trees(writer, &trees, args.format),
    };
    written.map_err(|e| format!("Failed to write output: {}", e))?;

    if let Some(path) = &args.output {
        eprintln!("  ✓ Wrote {} tree(s) to {}", trees.len(), path.display());
    }
    Ok(())
}

/// Load a grammar catalog and report what it defines
fn validate_grammar(grammar: PathBuf) -> Result<(), String> {
    println!("🔍 Validating grammar {}...", grammar.display());

    let catalog = GrammarCatalog::load_from_file(&grammar)
        .map_err(|e| format!("Failed to load grammar: {}", e))?;

    println!(
        "  ✓ Loaded {} ({} rules)",
        catalog.name().unwrap_or("unnamed grammar"),
        catalog.rule_count()
    );

    let missing = catalog.missing_templates();
    if missing.is_empty() {
        println!("  ✓ Every REGULAR and LOOP segment has a field template");
    } else {
        for code in &missing {
            println!("  ⚠ No field template for segment {}", code);
        }
    }

    let options = catalog.options();
    println!(
        "  ℹ Delimiter {:?}, terminator {:?}, unrecognized segments: {}",
        options.delimiter, options.segment_terminator, options.unrecognized
    );

    println!("✨ Grammar is valid");
    Ok(())
}
