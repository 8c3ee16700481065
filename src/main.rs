// Tallies PubMed article counts per journal, keyword, author and date range,
// writing an audit log, a CSV table and a chart for each run.

// Copyright 2025 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use journal_tally::fetch::DEFAULT_ENDPOINT;
use journal_tally::input::load_unique_lines;
use journal_tally::web::{start_web_server, ResultsStore};
use journal_tally::{parse_date, run, DateField, Mode, PubMedClient, RunSummary, TallyRequest};

// CL arguments for config
#[derive(Parser, Debug)]
#[command(author, version, about = "PubMed article counts by journal, keyword and date range", long_about = None)]
struct Args {
    /// File with one journal name per line
    #[arg(long)]
    journal_names_path: Option<PathBuf>,

    /// File with one author name per line
    #[arg(long)]
    author_names_path: Option<PathBuf>,

    /// File with one free-text term per line
    #[arg(long)]
    text_terms_path: Option<PathBuf>,

    /// File with one MeSH term per line
    #[arg(long)]
    mesh_terms_path: Option<PathBuf>,

    /// File with one keyword per line; each keyword becomes a column
    #[arg(long)]
    keywords_path: Option<PathBuf>,

    #[arg(long)]
    custom_expression: Option<String>,

    /// MM/DD/YYYY
    #[arg(long, value_parser = parse_date)]
    from_date: Option<NaiveDate>,

    /// MM/DD/YYYY, defaults to today in date-range mode
    #[arg(long, value_parser = parse_date)]
    to_date: Option<NaiveDate>,

    #[arg(long, default_value = "1")]
    date_interval_in_years: i32,

    /// Inferred from the inputs when omitted
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    #[arg(long, value_enum, default_value = "long")]
    date_field: DateField,

    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Where the run's files go; a fresh temporary folder when omitted
    #[arg(short, long)]
    target_folder: Option<PathBuf>,

    /// Start the web interface instead of running once
    #[arg(long, default_value_t = false)]
    serve: bool,

    #[arg(short, long, default_value = "18927")]
    port: u16,

    #[arg(long, default_value = "results")]
    results_folder: PathBuf,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn load_list(path: Option<&Path>) -> Result<Vec<String>> {
    match path {
        Some(path) => load_unique_lines(path).with_context(|| format!("reading {:?}", path)),
        None => Ok(Vec::new()),
    }
}

fn build_request(args: &Args) -> Result<TallyRequest> {
    Ok(TallyRequest {
        journal_names: load_list(args.journal_names_path.as_deref())?,
        author_names: load_list(args.author_names_path.as_deref())?,
        text_terms: load_list(args.text_terms_path.as_deref())?,
        mesh_terms: load_list(args.mesh_terms_path.as_deref())?,
        keywords: load_list(args.keywords_path.as_deref())?,
        custom_expression: args.custom_expression.clone(),
        from_date: args.from_date,
        to_date: args.to_date,
        date_interval_in_years: Some(args.date_interval_in_years),
        mode: args.mode,
        date_field: args.date_field,
    })
}

fn print_summary(summary: &RunSummary) {
    println!("{}", "=".repeat(64));
    println!("Results");
    println!("{}", "=".repeat(64));
    println!("log_path = {}", summary.log_path.display());
    println!("table_path = {}", summary.table_path.display());
    if let Some(figure_path) = &summary.figure_path {
        println!("figure_path = {}", figure_path.display());
    }
    println!("Searches run: {}", summary.search_count);
    if let (Some(selected), Some(total)) =
        (summary.selected_search_count, summary.total_search_count)
    {
        println!("Selected search count: {}", selected);
        println!("Total search count: {}", total);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let source = PubMedClient::new(&args.endpoint, Duration::from_secs(args.timeout_secs))?;

    if args.serve {
        let store = ResultsStore::open(&args.results_folder)?;
        start_web_server(args.port, store, Arc::new(source)).await;
        return Ok(());
    }

    let request = build_request(&args)?;
    let target_folder = match &args.target_folder {
        Some(folder) => {
            fs::create_dir_all(folder)?;
            folder.clone()
        }
        None => tempfile::Builder::new()
            .prefix("journal-tally-")
            .tempdir()?
            .keep(),
    };
    info!(target_folder = %target_folder.display(), "writing results");

    let summary = run(&target_folder, &request, &source).await?;
    print_summary(&summary);
    Ok(())
}
