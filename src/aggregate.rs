//! Drives the selected/total count fetches over a row × column grid.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::dates::DateRange;
use crate::error::Result;
use crate::expression::{build_expression, SearchCriteria};
use crate::fetch::CountSource;

/// One axis value of the grid and the part of the query it controls.
#[derive(Debug, Clone, PartialEq)]
pub enum Discriminant {
    Journal(String),
    Period(DateRange),
    Author(String),
    /// Restricts only the selected expression, as a text word.
    Keyword(String),
    /// Contributes nothing; used when an axis has a single unnamed column.
    All,
}

impl Discriminant {
    pub fn label(&self) -> String {
        match self {
            Discriminant::Journal(name) | Discriminant::Author(name) | Discriminant::Keyword(name) => {
                name.clone()
            }
            Discriminant::Period(range) => range.start.format("%Y").to_string(),
            Discriminant::All => "all".to_string(),
        }
    }

    fn apply_scope(&self, criteria: &mut SearchCriteria) {
        match self {
            Discriminant::Journal(name) => criteria.journal_name = Some(name.clone()),
            Discriminant::Author(name) => criteria.author_name = Some(name.clone()),
            Discriminant::Period(range) => {
                criteria.from_date = Some(range.start);
                criteria.to_date = Some(range.end);
            }
            Discriminant::Keyword(_) | Discriminant::All => {}
        }
    }

    fn apply_selection(&self, criteria: &mut SearchCriteria) {
        if let Discriminant::Keyword(keyword) = self {
            criteria.text_terms.push(keyword.clone());
        }
    }
}

/// Append-only record of every expression sent upstream and the count it
/// returned, one `expression<TAB>count` line per fetch.
pub struct AuditLog<W: Write> {
    writer: W,
    entries: usize,
}

impl AuditLog<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> AuditLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, entries: 0 }
    }

    pub fn record(&mut self, expression: &str, count: u64) -> Result<()> {
        info!(expression, count, "search count");
        writeln!(self.writer, "{}\t{}", expression, count)?;
        self.writer.flush()?;
        self.entries += 1;
        Ok(())
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

async fn fetch_logged<S, W>(source: &S, audit: &mut AuditLog<W>, expression: &str) -> Result<u64>
where
    S: CountSource + ?Sized,
    W: Write,
{
    let count = source.fetch_count(expression).await?;
    audit.record(expression, count)?;
    Ok(count)
}

/// `selected / total`, or `None` when the ratio is meaningless: a zero
/// denominator, or an upstream that reports more selected than total.
pub fn fraction(selected: u64, total: u64) -> Option<f64> {
    if total == 0 || selected > total {
        return None;
    }
    Some(selected as f64 / total as f64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cell {
    pub selected: u64,
    pub total: u64,
    pub fraction: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RowSummary {
    pub selected_count: u64,
    pub total_count: u64,
    pub selected_fraction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountTable {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    cells: Vec<Vec<Cell>>,
}

impl CountTable {
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        &self.cells[row][column]
    }

    pub fn row(&self, row: usize) -> &[Cell] {
        &self.cells[row]
    }

    pub fn row_summary(&self, row: usize) -> RowSummary {
        let selected_count = self.cells[row].iter().map(|c| c.selected).sum();
        let total_count = self.cells[row].iter().map(|c| c.total).sum();
        RowSummary {
            selected_count,
            total_count,
            selected_fraction: fraction(selected_count, total_count),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub table: CountTable,
    pub selected_search_count: u64,
    pub total_search_count: u64,
}

/// Fetches a selected and a total count for every (row, column) pair in
/// row-major order. The selected expression is the template's scope, the
/// discriminants and the template's restrictions; the total expression
/// drops the restrictions. Each count is written to `audit` before the next
/// request goes out, so a failed run leaves a log of everything fetched.
pub async fn aggregate<S, W>(
    rows: &[Discriminant],
    columns: &[Discriminant],
    template: &SearchCriteria,
    source: &S,
    audit: &mut AuditLog<W>,
) -> Result<Aggregation>
where
    S: CountSource + ?Sized,
    W: Write,
{
    let restriction = template.selection_expression();
    let mut cells = Vec::with_capacity(rows.len());
    let mut selected_search_count = 0;
    let mut total_search_count = 0;

    for row in rows {
        let mut row_cells = Vec::with_capacity(columns.len());
        for column in columns {
            let mut total_criteria = template.scope();
            row.apply_scope(&mut total_criteria);
            column.apply_scope(&mut total_criteria);

            let mut selected_criteria = total_criteria.clone();
            row.apply_selection(&mut selected_criteria);
            column.apply_selection(&mut selected_criteria);
            if !restriction.is_empty() {
                selected_criteria.custom_expression = Some(restriction.clone());
            }

            let selected =
                fetch_logged(source, audit, &build_expression(&selected_criteria)).await?;
            let total = fetch_logged(source, audit, &build_expression(&total_criteria)).await?;

            if selected > total {
                warn!(
                    row = %row.label(),
                    column = %column.label(),
                    selected,
                    total,
                    "selected count exceeds total"
                );
            }

            selected_search_count += selected;
            total_search_count += total;
            row_cells.push(Cell {
                selected,
                total,
                fraction: fraction(selected, total),
            });
        }
        cells.push(row_cells);
    }

    Ok(Aggregation {
        table: CountTable {
            row_labels: rows.iter().map(Discriminant::label).collect(),
            column_labels: columns.iter().map(Discriminant::label).collect(),
            cells,
        },
        selected_search_count,
        total_search_count,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorCount {
    pub author: String,
    pub articles_count: u64,
}

/// One fetch per author, scoped by the template's journal and dates.
pub async fn tally_authors<S, W>(
    authors: &[String],
    template: &SearchCriteria,
    source: &S,
    audit: &mut AuditLog<W>,
) -> Result<Vec<AuthorCount>>
where
    S: CountSource + ?Sized,
    W: Write,
{
    let mut counts = Vec::with_capacity(authors.len());
    for author in authors {
        let mut criteria = template.scope();
        criteria.author_name = Some(author.clone());
        let articles_count = fetch_logged(source, audit, &build_expression(&criteria)).await?;
        counts.push(AuthorCount {
            author: author.clone(),
            articles_count,
        });
    }
    Ok(counts)
}
