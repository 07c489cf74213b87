use clap::Parser;
use tracing_subscriber::EnvFilter;

use raglite::{
    CollectionId, DataDir, IndexManager,
    cli::{Cli, Command},
    error,
    manager::IndexOptions,
    ranker,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RAGLITE_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let index_dir = data_dir.index_dir()?;

    match cli.command {
        Command::Index(args) => {
            let defaults = IndexOptions::default();
            let options = IndexOptions {
                chunk_size: args.chunk_size.unwrap_or(defaults.chunk_size),
                overlap_size: args
                    .overlap_size
                    .unwrap_or(defaults.overlap_size),
            };
            let manager = IndexManager::with_options(index_dir, options);
            let id = CollectionId::new(&args.owner, &args.collection);

            let outcome = manager.index(&id, &args.dir, args.force);
            println!("{}", outcome.message);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Command::Search(args) => {
            let manager = IndexManager::new(index_dir);
            let id = CollectionId::new(&args.owner, &args.collection);

            let results = manager.search(&id, &args.query, args.count);
            if args.json {
                ranker::format_json(&results)?;
            } else {
                ranker::format_human(&results);
            }
        }
        Command::Info(args) => {
            let manager = IndexManager::new(index_dir);
            let id = CollectionId::new(&args.owner, &args.collection);

            match manager.get_index_info(&id) {
                Some(info) if args.json => {
                    println!("{}", serde_json::to_string(&info)?);
                }
                Some(info) => {
                    println!("Collection: {id}");
                    println!("Files: {}", info.files_count);
                    for file in &info.files {
                        println!("  {file}");
                    }
                    println!("Chunks: {}", info.total_chunks);
                    println!("Unique terms: {}", info.total_unique_words);
                    println!(
                        "Matrix shape: {} x {}",
                        info.matrix_shape[0], info.matrix_shape[1]
                    );
                    println!("Chunk size: {}", info.chunk_size);
                    println!("Overlap size: {}", info.overlap_size);
                    println!("Last updated: {}", info.last_updated);
                }
                None => {
                    println!("No index found for {id}");
                }
            }
        }
    }

    Ok(())
}
