use std::fs;
use std::process::ExitCode;

use analyzer::analysis::{analyze_request, render_outline};
use analyzer::config::AnalyzerConfig;
use analyzer::parse;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Indented outline with problems under each step
    Text,
    /// The full report as JSON
    Json,
}

/// Check a workflow's block structure and variable references
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the workflow request JSON file
    file: String,

    /// Analyzer options JSON; overrides any `options` in the request
    #[arg(short, long)]
    config: Option<String>,

    #[arg(short, long, value_enum, default_value = "text")]
    format: Format,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let json = fs::read_to_string(&cli.file)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to read '{}': {}", cli.file, e)));
    let mut request = parse::parse(&json)
        .unwrap_or_else(|e| exit_with_error(&format!("[{}] {}", e.code(), e)));

    if let Some(path) = &cli.config {
        let text = fs::read_to_string(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to read '{}': {}", path, e)));
        request.options = AnalyzerConfig::from_json(&text)
            .unwrap_or_else(|e| exit_with_error(&format!("[{}] {}", e.code(), e)));
    }

    let report = analyze_request(&request);
    match cli.format {
        Format::Text => {
            print!("{}", render_outline(&request.steps, &report));
            println!();
            print!("{}", report);
        }
        Format::Json => match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{}", out),
            Err(e) => exit_with_error(&format!("Failed to serialize report: {}", e)),
        },
    }

    if report.is_saveable() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("error: {}", message);
    std::process::exit(2);
}
