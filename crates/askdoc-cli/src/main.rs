//! CLI entry point for the askdoc backend (for dev and testing).

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use askdoc_core::{
    app_data_dir, config_path, load_config, save_config, status, BuildReport, Config,
    OllamaEmbedder, QueryResult, Session, Source,
};
use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "askdoc")]
#[command(about = "askdoc: ask questions of a PDF manual or a CSV FAQ")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status (for dev).
    Status,
    /// Show where askdoc stores its config (app data directory).
    DataDir,
    /// Print the effective config as TOML.
    Config {
        /// Write the defaults to the config file first.
        #[arg(long)]
        init: bool,
    },
    /// Load and chunk a corpus without embedding it, and list the records.
    Inspect {
        /// PDF or CSV file.
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Index a corpus and answer a single question.
    Ask {
        /// The question.
        query: String,
        /// PDF or CSV file; defaults to `default_corpus` from the config.
        #[arg(short, long, value_name = "PATH")]
        corpus: Option<PathBuf>,
        /// Number of results (defaults to `top_k` from the config).
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Print the build report and results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Index a corpus, then answer questions read from stdin.
    Chat {
        /// PDF or CSV file; defaults to `default_corpus` from the config.
        #[arg(value_name = "PATH")]
        corpus: Option<PathBuf>,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

#[derive(Serialize)]
struct AskOutput<'a> {
    query: &'a str,
    build: &'a BuildReport,
    result: &'a QueryResult,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("askdoc backend");
            println!("  core: {}", status());
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => {
                eprintln!("Could not determine app data directory.");
                return ExitCode::FAILURE;
            }
        },
        Commands::Config { init } => {
            if init {
                match save_config(&Config::default()) {
                    Ok(path) => eprintln!("Wrote {}", path.display()),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            }
            if let Some(path) = config_path() {
                eprintln!("# {}", path.display());
            }
            match toml::to_string_pretty(&load_config()) {
                Ok(s) => print!("{}", s),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        Commands::Inspect { path } => {
            let Some(session) = open_session() else {
                return ExitCode::FAILURE;
            };
            match session.prepare(&Source::Path(path.clone())) {
                Ok(corpus) => {
                    println!(
                        "{} record(s) from {} ({} skipped)",
                        corpus.units.len(),
                        path.display(),
                        corpus.skipped
                    );
                    for r in corpus.units {
                        println!("  #{:<4} {}", r.id, preview(&r.content, 60));
                    }
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        Commands::Ask {
            query,
            corpus,
            top_k,
            json,
        } => {
            let Some(mut session) = open_session() else {
                return ExitCode::FAILURE;
            };
            let Some(report) = build(&mut session, corpus).await else {
                return ExitCode::FAILURE;
            };
            let top_k = top_k.unwrap_or(session.config().top_k);
            match session.answer(&query, top_k).await {
                Ok(result) if json => {
                    let out = AskOutput {
                        query: &query,
                        build: &report,
                        result: &result,
                    };
                    match serde_json::to_string_pretty(&out) {
                        Ok(s) => println!("{}", s),
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            return ExitCode::FAILURE;
                        }
                    }
                }
                Ok(result) => {
                    eprintln!("{}", report);
                    println!("{}", result);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        Commands::Chat { corpus, top_k } => {
            let Some(mut session) = open_session() else {
                return ExitCode::FAILURE;
            };
            if let Some(report) = build(&mut session, corpus).await {
                println!("{}", report);
            }
            let top_k = top_k.unwrap_or(session.config().top_k);
            chat(&mut session, top_k).await;
        }
    }
    ExitCode::SUCCESS
}

fn open_session() -> Option<Session<OllamaEmbedder>> {
    let config = load_config();
    let embedder = match OllamaEmbedder::from_config(&config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {}", e);
            return None;
        }
    };
    match Session::new(embedder, config) {
        Ok(s) => Some(s),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

/// Index `corpus` (or the configured default). Prints the error and returns `None` on failure.
async fn build(
    session: &mut Session<OllamaEmbedder>,
    corpus: Option<PathBuf>,
) -> Option<BuildReport> {
    let res = match corpus {
        Some(path) => session.load(&Source::Path(path)).await,
        None => session.load_default().await,
    };
    match res {
        Ok(report) => Some(report),
        Err(e) => {
            eprintln!("Indexing error: {}", e);
            None
        }
    }
}

async fn chat(session: &mut Session<OllamaEmbedder>, top_k: usize) {
    println!("Type a question, `:load <path>` to index another file, `:examples`, or `:quit`.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line == ":quit" {
            break;
        }
        if line == ":examples" {
            for q in &session.config().example_queries {
                println!("  {}", q);
            }
            continue;
        }
        if let Some(path) = line.strip_prefix(":load") {
            if let Some(report) = build(session, Some(PathBuf::from(path.trim()))).await {
                println!("{}", report);
            }
            continue;
        }
        match session.answer(line, top_k).await {
            Ok(result) => println!("{}\n", result),
            Err(e) => println!("{}\n", e),
        }
    }
}

/// First line of `text`, cut to `max` characters.
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() > max {
        format!("{}...", line.chars().take(max).collect::<String>())
    } else {
        line.to_string()
    }
}
