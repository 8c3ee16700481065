use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use crate::aggregate::{aggregate, tally_authors, AuditLog, Discriminant};
use crate::dates::partition;
use crate::error::{Result, TallyError};
use crate::expression::{DateField, SearchCriteria};
use crate::fetch::CountSource;
use crate::output;

pub const LOG_NAME: &str = "search_counts.log";
pub const TABLE_NAME: &str = "search_counts.csv";
pub const FIGURE_NAME: &str = "search_counts.svg";
pub const SUMMARY_NAME: &str = "summary.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Rows are date ranges, columns are journals
    DateRanges,
    /// Rows are journals, columns are keywords
    Keywords,
    /// One count per author
    Authors,
}

/// Everything a single run needs, built once from the command line or a
/// submitted form.
#[derive(Debug, Clone, Default)]
pub struct TallyRequest {
    pub journal_names: Vec<String>,
    pub author_names: Vec<String>,
    pub text_terms: Vec<String>,
    pub mesh_terms: Vec<String>,
    pub keywords: Vec<String>,
    pub custom_expression: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub date_interval_in_years: Option<i32>,
    pub mode: Option<Mode>,
    pub date_field: DateField,
}

impl TallyRequest {
    pub fn mode(&self) -> Mode {
        if let Some(mode) = self.mode {
            return mode;
        }
        if !self.author_names.is_empty() {
            Mode::Authors
        } else if self.keywords.is_empty() && self.from_date.is_some() {
            Mode::DateRanges
        } else {
            Mode::Keywords
        }
    }

    fn template(&self, with_dates: bool) -> SearchCriteria {
        SearchCriteria {
            text_terms: self.text_terms.clone(),
            mesh_terms: self.mesh_terms.clone(),
            custom_expression: self.custom_expression.clone(),
            from_date: self.from_date.filter(|_| with_dates),
            to_date: self.to_date.filter(|_| with_dates),
            date_field: self.date_field,
            ..SearchCriteria::default()
        }
    }

    fn journals(&self) -> Result<Vec<Discriminant>> {
        if self.journal_names.is_empty() {
            return Err(TallyError::MissingInput("journal names"));
        }
        Ok(self
            .journal_names
            .iter()
            .cloned()
            .map(Discriminant::Journal)
            .collect())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: Mode,
    pub log_path: PathBuf,
    pub table_path: PathBuf,
    pub figure_path: Option<PathBuf>,
    pub image_name: Option<String>,
    pub selected_search_count: Option<u64>,
    pub total_search_count: Option<u64>,
    pub search_count: usize,
}

/// Runs one tally and writes its artifacts into `target_folder`. Input
/// problems are reported before anything is fetched; a fetch failure stops
/// the run with the audit log holding every count fetched so far.
pub async fn run<S>(target_folder: &Path, request: &TallyRequest, source: &S) -> Result<RunSummary>
where
    S: CountSource + ?Sized,
{
    let start_time = Instant::now();
    let mode = request.mode();
    info!(?mode, target_folder = %target_folder.display(), "starting tally");

    let log_path = target_folder.join(LOG_NAME);
    let table_path = target_folder.join(TABLE_NAME);

    let summary = match mode {
        Mode::Authors => {
            if request.author_names.is_empty() {
                return Err(TallyError::MissingInput("author names"));
            }
            let template = request.template(true);
            let mut audit = AuditLog::create(&log_path)?;
            let counts = tally_authors(&request.author_names, &template, source, &mut audit).await?;
            output::write_author_counts(&table_path, &counts)?;
            RunSummary {
                mode,
                log_path,
                table_path,
                figure_path: None,
                image_name: None,
                selected_search_count: None,
                total_search_count: None,
                search_count: audit.entries(),
            }
        }
        Mode::DateRanges => {
            let journals = request.journals()?;
            let from_date = request.from_date.ok_or(TallyError::MissingInput("from date"))?;
            let to_date = request
                .to_date
                .unwrap_or_else(|| chrono::Local::now().date_naive());
            let ranges = partition(from_date, to_date, request.date_interval_in_years.unwrap_or(1))?;
            let rows: Vec<Discriminant> = ranges.into_iter().map(Discriminant::Period).collect();

            let mut audit = AuditLog::create(&log_path)?;
            let result = aggregate(&rows, &journals, &request.template(false), source, &mut audit).await?;
            output::write_count_table(&table_path, &result.table)?;
            let figure_path = target_folder.join(FIGURE_NAME);
            output::write_chart(&figure_path, &result.table)?;

            RunSummary {
                mode,
                log_path,
                table_path,
                figure_path: Some(figure_path),
                image_name: Some(FIGURE_NAME.to_string()),
                selected_search_count: Some(result.selected_search_count),
                total_search_count: Some(result.total_search_count),
                search_count: audit.entries(),
            }
        }
        Mode::Keywords => {
            let journals = request.journals()?;
            if let (Some(from), Some(to)) = (request.from_date, request.to_date) {
                if from > to {
                    return Err(TallyError::InvalidRange(format!("{} is after {}", from, to)));
                }
            }
            let columns: Vec<Discriminant> = if request.keywords.is_empty() {
                vec![Discriminant::All]
            } else {
                request.keywords.iter().cloned().map(Discriminant::Keyword).collect()
            };

            let mut audit = AuditLog::create(&log_path)?;
            let result = aggregate(&journals, &columns, &request.template(true), source, &mut audit).await?;
            output::write_count_table(&table_path, &result.table)?;

            RunSummary {
                mode,
                log_path,
                table_path,
                figure_path: None,
                image_name: None,
                selected_search_count: Some(result.selected_search_count),
                total_search_count: Some(result.total_search_count),
                search_count: audit.entries(),
            }
        }
    };

    fs::write(
        target_folder.join(SUMMARY_NAME),
        serde_json::to_string_pretty(&summary)?,
    )?;

    info!(
        searches = summary.search_count,
        duration_ms = start_time.elapsed().as_millis(),
        "tally complete"
    );
    Ok(summary)
}
