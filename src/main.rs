// Command-line entry point for Glassbox.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::Path;

use glassbox::application;
use glassbox::infrastructure::concurrency;
use glassbox::infrastructure::config::EngineConfig;
use glassbox::infrastructure::graph_cache::GraphCache;
use glassbox::ports::dot_exporter::DotExporter;
use glassbox::ports::json_exporter::JsonExporter;
use glassbox::ports::GraphExporter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input source file path (can specify multiple)
    #[arg(short, long, required = false)]
    input: Vec<String>,

    /// Inline source text (alternative to --input)
    #[arg(short, long)]
    code: Option<String>,

    /// Engine to run (structure, trace)
    #[arg(short, long, default_value = "structure")]
    mode: String,

    /// Output file path (stdout when omitted)
    #[arg(short, long)]
    output: Option<String>,

    /// Output format for structure graphs (json, dot)
    #[arg(short, long, default_value = "json")]
    format: String,

    /// Engine tuning file (TOML)
    #[arg(long)]
    config: Option<String>,

    /// Cache directory for compiled structure graphs
    #[arg(long)]
    cache_dir: Option<String>,

    /// Run the API server on this port instead of a one-shot command
    #[arg(long)]
    serve: Option<u16>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(Path::new(path))?,
        None => EngineConfig::default(),
    };

    if let Some(port) = cli.serve {
        return glassbox::api::server::start_server(port, config);
    }

    let mut sources: Vec<(String, String)> = Vec::new();
    if let Some(code) = &cli.code {
        sources.push(("<inline>".to_string(), code.clone()));
    }
    for input_file in &cli.input {
        match fs::read_to_string(input_file) {
            Ok(code) => sources.push((input_file.clone(), code)),
            Err(e) => eprintln!("[WARN] Cannot read input file {}: {}", input_file, e),
        }
    }

    if sources.is_empty() {
        anyhow::bail!("Please provide --code <text> or at least one --input <file>");
    }

    match cli.mode.as_str() {
        "structure" => run_structure(&cli, &config, sources),
        "trace" => run_trace(&cli, &config, &sources),
        other => anyhow::bail!("Unknown mode: {} (expected 'structure' or 'trace')", other),
    }
}

fn run_structure(
    cli: &Cli,
    config: &EngineConfig,
    sources: Vec<(String, String)>,
) -> Result<()> {
    if sources.len() > 1 {
        // Batch path: parallel compile, one JSON document keyed by file.
        if cli.format != "json" {
            anyhow::bail!("Batch compilation only supports --format json");
        }
        if let Err(e) = concurrency::init_thread_pool() {
            eprintln!("[WARN] Thread pool already initialized: {}", e);
        }
        let results = application::compile_structure_batch(&sources, config);
        let json = serde_json::to_string_pretty(&results)?;
        write_output(cli.output.as_deref(), &json)?;
        println!("[Glassbox] Compiled {} sources", results.len());
        return Ok(());
    }

    let (name, source) = &sources[0];
    let cache = match &cli.cache_dir {
        Some(dir) => Some(GraphCache::open(Path::new(dir))?),
        None => None,
    };

    let graph = match cache.as_ref().and_then(|c| c.get(source)) {
        Some(cached) => {
            println!("[Cache] Hit for {}", name);
            cached
        }
        None => {
            let graph = application::compile_structure(source, config);
            if let Some(cache) = &cache {
                cache.put(source, &graph)?;
            }
            graph
        }
    };

    match cli.format.as_str() {
        "json" => match &cli.output {
            Some(path) => {
                JsonExporter.export(&graph, path)?;
                println!("[Glassbox] Output written to {}", path);
            }
            None => println!("{}", serde_json::to_string_pretty(&graph)?),
        },
        "dot" => match &cli.output {
            Some(path) => {
                DotExporter.export(&graph, path)?;
                println!("[Glassbox] Output written to {}", path);
            }
            None => println!("{}", DotExporter::to_dot(&graph)),
        },
        other => anyhow::bail!("Unknown format: {} (expected 'json' or 'dot')", other),
    }
    Ok(())
}

fn run_trace(cli: &Cli, config: &EngineConfig, sources: &[(String, String)]) -> Result<()> {
    if sources.len() > 1 {
        anyhow::bail!("Trace mode takes exactly one source");
    }
    let (_, source) = &sources[0];
    let trace = application::trace_execution(source, config);
    let json = serde_json::to_string_pretty(&trace)?;
    write_output(cli.output.as_deref(), &json)?;
    Ok(())
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("Failed to write {}", path))?;
            println!("[Glassbox] Output written to {}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}
