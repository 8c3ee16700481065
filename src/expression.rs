//! Builds PubMed search expressions from filter criteria.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Upper bound rendered when a date range has no end.
pub const OPEN_END: &str = "3000";

/// How the publication-date clause is rendered. The two forms are kept as
/// separate presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DateField {
    /// `"2010/01/31"[Date - Publication]`
    #[default]
    #[value(name = "long")]
    PublicationDateLong,
    /// `"01/31/2010"[PDAT]`
    #[value(name = "short")]
    PublicationDateShort,
}

impl DateField {
    pub fn tag(self) -> &'static str {
        match self {
            DateField::PublicationDateLong => "[Date - Publication]",
            DateField::PublicationDateShort => "[PDAT]",
        }
    }

    pub fn format(self, date: NaiveDate) -> String {
        match self {
            DateField::PublicationDateLong => date.format("%Y/%m/%d").to_string(),
            DateField::PublicationDateShort => date.format("%m/%d/%Y").to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub journal_name: Option<String>,
    pub text_terms: Vec<String>,
    pub mesh_terms: Vec<String>,
    pub custom_expression: Option<String>,
    pub author_name: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub date_field: DateField,
}

impl SearchCriteria {
    /// The restricting part of the criteria (terms and custom expression),
    /// rendered on its own. Empty when nothing restricts the search.
    pub fn selection_expression(&self) -> String {
        build_expression(&SearchCriteria {
            text_terms: self.text_terms.clone(),
            mesh_terms: self.mesh_terms.clone(),
            custom_expression: self.custom_expression.clone(),
            ..SearchCriteria::default()
        })
    }

    /// Copy of the criteria with every restricting field cleared, leaving
    /// journal, author and dates.
    pub fn scope(&self) -> SearchCriteria {
        SearchCriteria {
            text_terms: Vec::new(),
            mesh_terms: Vec::new(),
            custom_expression: None,
            ..self.clone()
        }
    }
}

pub fn build_expression(criteria: &SearchCriteria) -> String {
    let mut clauses: Vec<String> = Vec::new();

    if let Some(journal) = present(&criteria.journal_name) {
        clauses.push(format!("\"{}\"[Journal]", journal));
    }

    let terms: Vec<String> = criteria
        .text_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| format!("\"{}\"[Text Word]", t))
        .chain(
            criteria
                .mesh_terms
                .iter()
                .filter(|t| !t.trim().is_empty())
                .map(|t| format!("\"{}\"[MeSH Terms]", t)),
        )
        .collect();
    if !terms.is_empty() {
        clauses.push(terms.join(" OR "));
    }

    if let Some(custom) = present(&criteria.custom_expression) {
        clauses.push(custom.to_string());
    }

    if let Some(author) = present(&criteria.author_name) {
        clauses.push(format!("\"{}\"[Author]", author));
    }

    if let Some(from_date) = criteria.from_date {
        let field = criteria.date_field;
        let to = criteria
            .to_date
            .map(|d| field.format(d))
            .unwrap_or_else(|| OPEN_END.to_string());
        clauses.push(format!(
            "\"{from}\"{tag} : \"{to}\"{tag}",
            from = field.format(from_date),
            to = to,
            tag = field.tag()
        ));
    }

    let expression = if clauses.len() <= 1 {
        clauses.concat()
    } else {
        format!("({})", clauses.join(") AND ("))
    };
    compact_whitespace(&expression)
}

pub fn compact_whitespace(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static pattern"));
    re.replace_all(text, " ").trim().to_string()
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_criteria_give_empty_expression() {
        assert_eq!(build_expression(&SearchCriteria::default()), "");
    }

    #[test]
    fn blank_strings_count_as_absent() {
        let criteria = SearchCriteria {
            journal_name: Some("   ".into()),
            custom_expression: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(build_expression(&criteria), "");
    }

    #[test]
    fn single_field_is_unwrapped() {
        let journal = SearchCriteria {
            journal_name: Some("Nature".into()),
            ..Default::default()
        };
        assert_eq!(build_expression(&journal), "\"Nature\"[Journal]");

        let author = SearchCriteria {
            author_name: Some("Smith J".into()),
            ..Default::default()
        };
        assert_eq!(build_expression(&author), "\"Smith J\"[Author]");

        let custom = SearchCriteria {
            custom_expression: Some("cancer NOT review[pt]".into()),
            ..Default::default()
        };
        assert_eq!(build_expression(&custom), "cancer NOT review[pt]");
    }

    #[test]
    fn terms_form_one_disjunction() {
        let criteria = SearchCriteria {
            text_terms: vec!["zebrafish".into(), "danio".into()],
            mesh_terms: vec!["Zebrafish".into()],
            ..Default::default()
        };
        assert_eq!(
            build_expression(&criteria),
            "\"zebrafish\"[Text Word] OR \"danio\"[Text Word] OR \"Zebrafish\"[MeSH Terms]"
        );
    }

    #[test]
    fn open_ended_date_uses_3000() {
        let criteria = SearchCriteria {
            from_date: Some(date(2010, 1, 5)),
            ..Default::default()
        };
        assert_eq!(
            build_expression(&criteria),
            "\"2010/01/05\"[Date - Publication] : \"3000\"[Date - Publication]"
        );
    }

    #[test]
    fn short_preset_changes_tag_and_format() {
        let criteria = SearchCriteria {
            from_date: Some(date(2010, 1, 5)),
            to_date: Some(date(2011, 12, 31)),
            date_field: DateField::PublicationDateShort,
            ..Default::default()
        };
        assert_eq!(
            build_expression(&criteria),
            "\"01/05/2010\"[PDAT] : \"12/31/2011\"[PDAT]"
        );
    }

    #[test]
    fn clauses_follow_fixed_order() {
        let criteria = SearchCriteria {
            date_field: DateField::PublicationDateLong,
            to_date: Some(date(2011, 12, 31)),
            from_date: Some(date(2010, 1, 1)),
            author_name: Some("Doe A".into()),
            custom_expression: Some("humans[mh]".into()),
            mesh_terms: vec!["Neoplasms".into()],
            text_terms: vec!["tumor".into()],
            journal_name: Some("Cell".into()),
        };
        assert_eq!(
            build_expression(&criteria),
            "(\"Cell\"[Journal]) AND (\"tumor\"[Text Word] OR \"Neoplasms\"[MeSH Terms]) \
             AND (humans[mh]) AND (\"Doe A\"[Author]) AND \
             (\"2010/01/01\"[Date - Publication] : \"2011/12/31\"[Date - Publication])"
        );
    }

    #[test]
    fn whitespace_is_collapsed() {
        let criteria = SearchCriteria {
            journal_name: Some("  The   Lancet ".into()),
            custom_expression: Some("\ta  \n OR   b ".into()),
            ..Default::default()
        };
        let expression = build_expression(&criteria);
        assert_eq!(expression, "(\" The Lancet \"[Journal]) AND ( a OR b )");
        assert!(!expression.contains("  "));
    }

    #[test]
    fn selection_and_scope_split_criteria() {
        let criteria = SearchCriteria {
            journal_name: Some("Cell".into()),
            text_terms: vec!["tumor".into()],
            custom_expression: Some("humans[mh]".into()),
            from_date: Some(date(2010, 1, 1)),
            ..Default::default()
        };
        assert_eq!(
            criteria.selection_expression(),
            "(\"tumor\"[Text Word]) AND (humans[mh])"
        );

        let scope = criteria.scope();
        assert!(scope.text_terms.is_empty());
        assert!(scope.custom_expression.is_none());
        assert_eq!(scope.journal_name.as_deref(), Some("Cell"));
        assert_eq!(scope.from_date, Some(date(2010, 1, 1)));
    }
}
