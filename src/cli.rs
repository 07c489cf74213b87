use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "raglite",
    about = "Lexical TF-IDF retrieval over private document collections"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index a collection's source directory (incremental by default)
    Index(IndexArgs),
    /// Search a collection for relevant chunks
    Search(SearchArgs),
    /// Show a collection's index summary
    Info(InfoArgs),
}

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Directory containing the collection's source files
    pub dir: PathBuf,

    /// Owner the collection belongs to
    #[arg(short, long)]
    pub owner: String,

    /// Collection name
    #[arg(short, long)]
    pub collection: String,

    /// Rebuild from scratch even when nothing changed
    #[arg(long)]
    pub force: bool,

    /// Chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Overlap between adjacent chunks in characters
    #[arg(long)]
    pub overlap_size: Option<usize>,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Owner the collection belongs to
    #[arg(short, long)]
    pub owner: String,

    /// Collection name
    #[arg(short, long)]
    pub collection: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "5")]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct InfoArgs {
    /// Owner the collection belongs to
    #[arg(short, long)]
    pub owner: String,

    /// Collection name
    #[arg(short, long)]
    pub collection: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from([
            "raglite", "search", "hello world", "-o", "alice", "-c", "notes",
        ]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "hello world");
                assert_eq!(args.owner, "alice");
                assert_eq!(args.collection, "notes");
                assert_eq!(args.count, 5);
                assert!(!args.json);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_index_with_force() {
        let cli = Cli::parse_from([
            "raglite", "index", "./docs", "-o", "alice", "-c", "notes",
            "--force",
        ]);
        match cli.command {
            Command::Index(args) => {
                assert!(args.force);
                assert!(args.chunk_size.is_none());
            }
            _ => panic!("expected index command"),
        }
    }
}
