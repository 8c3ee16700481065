pub mod aggregate;
pub mod dates;
pub mod error;
pub mod expression;
pub mod fetch;
pub mod input;
pub mod output;
pub mod run;
pub mod web;

#[cfg(test)]
mod testing;

pub use aggregate::{aggregate, tally_authors, Aggregation, AuditLog, CountTable, Discriminant};
pub use dates::{parse_date, partition, DateRange};
pub use error::{Result, TallyError};
pub use expression::{build_expression, DateField, SearchCriteria};
pub use fetch::{CountSource, PubMedClient};
pub use run::{run, Mode, RunSummary, TallyRequest};
