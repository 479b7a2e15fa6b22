//! CLI entry point: pick the artifact, validate the table, emit to stdout.

use clap::Parser;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing_subscriber::EnvFilter;

use metagen_asm::{emit_code, emit_headers, instruction_set, validate};

/// The two artifacts this tool can generate.
#[derive(Clone, Copy, Debug, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
enum Artifact {
    /// Encoder and disassembler prototypes.
    Headers,
    /// Encoder and disassembler definitions.
    Code,
}

#[derive(Parser)]
#[command(name = "metagen-asm")]
#[command(about = "Generates the machine-code emitter and disassembler as C source")]
struct Cli {
    /// Artifact to emit: `headers` or `code`.
    artifact: Option<String>,
}

fn usage() {
    println!("usage: ");
    for artifact in Artifact::iter() {
        println!("\tmetagen-asm {artifact}");
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

    let defs = instruction_set();
    if let Err(err) = validate(&defs) {
        eprintln!("metagen-asm: {err}");
        std::process::exit(1);
    }

    let text = match artifact {
        Artifact::Headers => emit_headers(&defs),
        Artifact::Code => emit_code(&defs),
    };
    print!("{text}");
}
