use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(version, about = "Route questions through retrieval, arithmetic, datasets and generation")]
pub struct Cli {
    /// Configuration file (defaults to config/default + APP__ environment)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer one query
    Ask {
        /// Query text
        query: String,

        /// Persona: financial, legal or general
        #[arg(short, long, default_value = "general")]
        persona: String,

        /// Extra context passed to the answer
        #[arg(short, long)]
        context: Option<String>,

        /// Text files to index before answering
        #[arg(long, num_args = 1..)]
        docs: Vec<PathBuf>,
    },

    /// List available personas
    Personas,

    /// List available datasets
    Datasets,

    /// Dry run: chunk and index text files, then print the summaries
    ///
    /// The index lives only for this run; use `ask --docs` to query files.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}
