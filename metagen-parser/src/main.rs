//! CLI entry point: build the grammar, preprocess it, emit one artifact.

use std::path::PathBuf;

use clap::Parser;
use strum::IntoEnumIterator;
use tracing_subscriber::EnvFilter;

use metagen_parser::{emit_artifact, language_grammar, preprocess, Artifact, EmitOptions};

#[derive(Parser)]
#[command(name = "metagen-parser")]
#[command(about = "Generates the toy-language lexer, parser, and AST definitions as C source")]
struct Cli {
    /// Artifact to emit: `parser.h`, `lexer.l`, `ast.h`, `parser.c`, or
    /// `unparser.c`.
    artifact: Option<String>,

    /// Directory containing the `*.template.*` files.
    #[arg(long, default_value = ".")]
    template_dir: PathBuf,

    /// Make the emitted parser report rule entry/match/failure on stderr.
    #[arg(long)]
    trace: bool,
}

fn usage() {
    println!("usage: ");
    for artifact in Artifact::iter() {
        println!("\tmetagen-parser {artifact}");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let artifact = match cli.artifact.as_deref().map(str::parse::<Artifact>) {
        Some(Ok(artifact)) => artifact,
        // Unknown or missing artifact prints the usage and reports success,
        // matching the build scripts this tool slots into.
        _ => {
            usage();
            return;
        }
    };

    let opts = EmitOptions {
        template_dir: cli.template_dir,
        trace: cli.trace,
    };

    let result = language_grammar()
        .and_then(|mut g| {
            preprocess(&mut g)?;
            Ok(g)
        })
        .and_then(|g| emit_artifact(&g, artifact, &opts));

    match result {
        Ok(text) => print!("{text}"),
        Err(err) => {
            eprintln!("metagen-parser: {err}");
            std::process::exit(1);
        }
    }
}
