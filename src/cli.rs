use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::query::QueryField;

#[derive(Debug, Parser)]
#[command(
    name = "papergraph",
    about = "Ingest academic PDFs into a property graph and search them \
             by metadata or semantic similarity"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Embedding model name (e.g. all-minilm-l6-v2)
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Use the deterministic offline embedder instead of a neural model
    #[arg(long, global = true)]
    pub offline_embedder: bool,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest every paper under a directory into the graph
    Ingest(IngestArgs),
    /// Search papers by an exact metadata field (substring match)
    Search(SearchArgs),
    /// Search papers by semantic similarity
    #[command(name = "ssearch")]
    Ssearch(SemanticSearchArgs),
    /// List all stored papers
    List(ListArgs),
    /// Export the induced subgraph of a result set as JSON
    Project(ProjectArgs),
    /// Show store statistics and the embedding configuration
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Ingest --

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// Directory containing the papers
    pub dir: PathBuf,

    /// Ingest plain-text (.txt) files instead of PDFs
    #[arg(long)]
    pub plain_text: bool,

    /// Number of keywords extracted per paper
    #[arg(long, default_value = "5")]
    pub keywords: usize,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Search --

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FieldArg {
    Title,
    Author,
    Topic,
    Keyword,
}

impl From<FieldArg> for QueryField {
    fn from(field: FieldArg) -> Self {
        match field {
            FieldArg::Title => QueryField::Title,
            FieldArg::Author => QueryField::Author,
            FieldArg::Topic => QueryField::Topic,
            FieldArg::Keyword => QueryField::Keyword,
        }
    }
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Field to match
    #[arg(value_enum)]
    pub field: FieldArg,

    /// The search term
    pub term: String,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Semantic search --

#[derive(Debug, Parser)]
pub struct SemanticSearchArgs {
    /// The search query
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Minimum similarity score threshold
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- List --

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Project --

#[derive(Debug, Parser)]
pub struct ProjectArgs {
    /// Project the top results of this semantic query
    #[arg(long, conflicts_with_all = ["field", "term"])]
    pub query: Option<String>,

    /// Project the results of an exact-field search
    #[arg(long, value_enum, requires = "term")]
    pub field: Option<FieldArg>,

    /// Term for the exact-field search
    #[arg(long, requires = "field")]
    pub term: Option<String>,

    /// Result limit for --query
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Write the JSON document here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "papergraph",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_ssearch_defaults() {
        let cli = Cli::parse_from(["papergraph", "ssearch", "hello"]);
        match cli.command {
            Command::Ssearch(args) => {
                assert_eq!(args.query, "hello");
                assert_eq!(args.count, 10);
                assert_eq!(args.min_score, None);
                assert!(!args.json);
            }
            _ => panic!("expected ssearch command"),
        }
    }

    #[test]
    fn parse_search_field() {
        let cli =
            Cli::parse_from(["papergraph", "search", "author", "fuller"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.field, FieldArg::Author);
                assert_eq!(args.term, "fuller");
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn project_query_conflicts_with_field() {
        let result = Cli::try_parse_from([
            "papergraph",
            "project",
            "--query",
            "graphs",
            "--field",
            "author",
            "--term",
            "fuller",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn project_term_requires_field() {
        let result =
            Cli::try_parse_from(["papergraph", "project", "--term", "fuller"]);
        assert!(result.is_err());
    }
}
