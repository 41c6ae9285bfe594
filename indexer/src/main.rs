mod corpus;

use anyhow::Result;
use clap::{Parser, Subcommand};
use corpus::Corpus;
use spimi_core::{build_index, IndexConfig, IndexVariant, SearchConfig, Searcher};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a memory-bounded inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Stop-words file, one word per line
        #[arg(long)]
        stopwords: Option<PathBuf>,
        /// Spill when this fraction of the memory budget is in use
        #[arg(long, default_value_t = 0.8)]
        load_factor: f64,
        /// Memory budget in MB
        #[arg(long, default_value_t = 256.0)]
        memory_mb: f64,
        /// Maximum size of one index segment in MB
        #[arg(long, default_value_t = 16.0)]
        index_segment_mb: f64,
        /// Maximum size of one registry segment in MB
        #[arg(long, default_value_t = 4.0)]
        registry_segment_mb: f64,
        /// frequency, weighted or positional
        #[arg(long, default_value_t = IndexVariant::Weighted)]
        variant: IndexVariant,
    },
    /// Run ranked queries against a built index; reads stdin when no query is given
    Query {
        /// Index directory
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        stopwords: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
        /// Memory budget in MB shared by the segment caches
        #[arg(long, default_value_t = 256.0)]
        memory_mb: f64,
        #[arg(long, default_value_t = 0.6)]
        index_cache_fraction: f64,
        #[arg(long, default_value_t = 0.2)]
        registry_cache_fraction: f64,
        /// Print each result set as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
        queries: Vec<String>,
    },
}

fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS };
        }
    };
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// 1 for bad arguments or settings, 2 for anything that went wrong with the data.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<spimi_core::Error>() {
        Some(e) if e.is_config() => 1,
        _ => 2,
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build { input, output, stopwords, load_factor, memory_mb, index_segment_mb, registry_segment_mb, variant } => {
            let config = IndexConfig {
                output,
                stopwords,
                load_factor,
                memory_budget_mb: memory_mb,
                max_index_segment_mb: index_segment_mb,
                max_registry_segment_mb: registry_segment_mb,
                variant,
            };
            config.validate()?;
            let corpus = Corpus::discover(&input)?;
            let summary = build_index(config, corpus.documents())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Query { index, stopwords, top_k, memory_mb, index_cache_fraction, registry_cache_fraction, json, queries } => {
            let config = SearchConfig {
                index,
                stopwords,
                top_k,
                memory_budget_mb: memory_mb,
                index_cache_fraction,
                registry_cache_fraction,
            };
            let searcher = Searcher::open(&config)?;
            if queries.is_empty() {
                for line in std::io::stdin().lock().lines() {
                    let line = line?;
                    if !line.trim().is_empty() {
                        print_results(&searcher, &line, json)?;
                    }
                }
            } else {
                for q in &queries {
                    print_results(&searcher, q, json)?;
                }
            }
            Ok(())
        }
    }
}

fn print_results(searcher: &Searcher, query: &str, json: bool) -> Result<()> {
    let results = searcher.search(query, searcher.top_k())?;
    if json {
        println!("{}", serde_json::to_string(&serde_json::json!({ "query": query, "results": results }))?);
        return Ok(());
    }
    println!("# {query} ({} hits)", results.total_hits);
    for (rank, hit) in results.hits.iter().enumerate() {
        println!("{}\t{:.4}\t{}", rank + 1, hit.score, hit.external_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spimi_core::Error;

    #[test]
    fn configuration_errors_exit_with_one() {
        let err = anyhow::Error::new(Error::Config("load factor must be in (0, 1]".into()));
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn data_errors_exit_with_two() {
        let io = Error::Io {
            path: PathBuf::from("index/meta.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let corrupt = Error::Corrupt { path: PathBuf::from("index/index-00001.seg"), line: 4, reason: "missing ';'".into() };
        assert_eq!(exit_code(&anyhow::Error::new(io)), 2);
        assert_eq!(exit_code(&anyhow::Error::new(corrupt)), 2);
    }

    #[test]
    fn errors_from_outside_the_library_exit_with_two() {
        assert_eq!(exit_code(&anyhow::anyhow!("stdout closed")), 2);
        let wrapped = anyhow::Error::new(Error::Config("bad".into())).context("opening index");
        assert_eq!(exit_code(&wrapped), 1);
    }
}
