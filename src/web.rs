// Small form front end: submit criteria, get a zip of the run's files back.

use chrono::Local;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use warp::http::{header, StatusCode};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::dates::parse_date;
use crate::error::{Result, TallyError};
use crate::expression::DateField;
use crate::fetch::CountSource;
use crate::input::{normalize_term, unique_lines};
use crate::output::archive_folder;
use crate::run::{run, Mode, RunSummary, TallyRequest};

/// Folder the finished archives are kept in. Handed to every route
/// instead of living in a global.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    folder: PathBuf,
}

impl ResultsStore {
    pub fn open(folder: &Path) -> Result<Self> {
        fs::create_dir_all(folder)?;
        Ok(Self {
            folder: folder.to_path_buf(),
        })
    }

    pub fn new_archive_name() -> String {
        let timestamp = Local::now().format("%Y%m%d-%M%H");
        let random: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(16)
            .collect();
        format!("{}-{}.zip", timestamp, random)
    }

    pub fn archive(&self, target_folder: &Path) -> Result<String> {
        let name = Self::new_archive_name();
        archive_folder(target_folder, &self.folder.join(&name))?;
        Ok(name)
    }

    /// Resolves a requested archive name using only its final component.
    pub fn locate(&self, requested: &str) -> Option<PathBuf> {
        let name = Path::new(requested).file_name()?;
        let path = self.folder.join(name);
        if path.extension().is_some_and(|e| e == "zip") && path.is_file() {
            Some(path)
        } else {
            None
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RunForm {
    #[serde(default)]
    pub journal_names: String,
    #[serde(default)]
    pub author_names: String,
    #[serde(default)]
    pub text_terms: String,
    #[serde(default)]
    pub mesh_terms: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub custom_expression: String,
    #[serde(default)]
    pub from_date: String,
    #[serde(default)]
    pub to_date: String,
    #[serde(default)]
    pub date_interval_in_years: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub date_field: String,
}

impl RunForm {
    pub fn into_request(self) -> TallyRequest {
        // A date that does not parse drops the whole range
        let (from_date, to_date) = match (parse_date(&self.from_date), parse_date(&self.to_date)) {
            (Ok(from), Ok(to)) => (Some(from), Some(to)),
            _ => (None, None),
        };

        let mode = match self.mode.trim() {
            "date-ranges" => Some(Mode::DateRanges),
            "keywords" => Some(Mode::Keywords),
            "authors" => Some(Mode::Authors),
            _ => None,
        };

        let date_field = match self.date_field.trim() {
            "short" => DateField::PublicationDateShort,
            _ => DateField::PublicationDateLong,
        };

        TallyRequest {
            journal_names: unique_lines(&self.journal_names),
            author_names: unique_lines(&self.author_names),
            text_terms: unique_lines(&self.text_terms),
            mesh_terms: unique_lines(&self.mesh_terms),
            keywords: unique_lines(&self.keywords),
            custom_expression: normalize_term(&self.custom_expression)
                .map(|_| self.custom_expression.trim().to_string()),
            from_date,
            to_date,
            date_interval_in_years: self.date_interval_in_years.trim().parse().ok(),
            mode,
            date_field,
        }
    }
}

struct RunPage {
    summary: RunSummary,
    archive_name: String,
    figure_svg: Option<String>,
}

async fn run_and_archive(
    request: &TallyRequest,
    store: &ResultsStore,
    source: &dyn CountSource,
) -> Result<RunPage> {
    let target = tempfile::Builder::new().prefix("journal-tally-").tempdir()?;
    let summary = run(target.path(), request, source).await?;
    let figure_svg = match &summary.figure_path {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };
    let archive_name = store.archive(target.path())?;
    Ok(RunPage {
        summary,
        archive_name,
        figure_svg,
    })
}

fn status_for(err: &TallyError) -> StatusCode {
    match err {
        TallyError::InvalidRange(_) | TallyError::InvalidDate(_) | TallyError::MissingInput(_) => {
            StatusCode::BAD_REQUEST
        }
        TallyError::CountParse { .. } | TallyError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub async fn handle_run(
    form: RunForm,
    store: ResultsStore,
    source: Arc<dyn CountSource>,
) -> std::result::Result<Response, Rejection> {
    let request = form.into_request();
    info!(mode = ?request.mode(), journals = request.journal_names.len(), "run requested");

    match run_and_archive(&request, &store, source.as_ref()).await {
        Ok(page) => Ok(warp::reply::html(response_html(&page)).into_response()),
        Err(e) => {
            error!(error = %e, "run failed");
            Ok(warp::reply::with_status(warp::reply::html(error_html(&e)), status_for(&e))
                .into_response())
        }
    }
}

pub async fn handle_download(
    archive_name: String,
    store: ResultsStore,
) -> std::result::Result<Response, Rejection> {
    // Answered here rather than rejected, so the POST-only run route cannot
    // turn a missing archive into 405.
    let Some(path) = store.locate(&archive_name) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let Ok(bytes) = tokio::fs::read(&path).await else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(warp::reply::with_header(
        warp::reply::with_header(bytes, header::CONTENT_TYPE, "application/zip"),
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", file_name),
    )
    .into_response())
}

pub fn routes(
    store: ResultsStore,
    source: Arc<dyn CountSource>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let store_filter = warp::any().map(move || store.clone());
    let source_filter = warp::any().map(move || source.clone());

    let index = warp::get()
        .and(warp::path::end())
        .map(|| warp::reply::html(index_html()));

    let run_route = warp::post()
        .and(warp::path("run"))
        .and(warp::path::end())
        .and(warp::body::content_length_limit(256 * 1024))
        .and(warp::body::form())
        .and(store_filter.clone())
        .and(source_filter)
        .and_then(handle_run);

    let download = warp::get()
        .and(warp::path!("download" / String))
        .and(store_filter)
        .and_then(handle_download);

    index.or(run_route).or(download)
}

pub async fn start_web_server(port: u16, store: ResultsStore, source: Arc<dyn CountSource>) {
    println!("Web interface running on http://localhost:{}", port);
    warp::serve(routes(store, source))
        .run(([127, 0, 0, 1], port))
        .await;
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const STYLE: &str = r#"
        body { font-family: Arial; margin: 20px; background: #f5f5f5; }
        h1 { color: #333; }
        .panel { background: white; padding: 20px; max-width: 800px; border: 1px solid #ddd; }
        .panel label { display: block; margin: 10px 0 5px 0; font-weight: bold; }
        .panel textarea, .panel input, .panel select { width: 100%; box-sizing: border-box; padding: 8px; }
        .panel textarea { height: 90px; font-family: monospace; }
        .form-row { display: grid; grid-template-columns: 1fr 1fr; gap: 15px; }
        button, .button { padding: 8px 16px; background: rgb(100, 149, 237); color: white; border: none; cursor: pointer; text-decoration: none; }
        button:hover, .button:hover { background: #5a8dd4; }
        .info { color: #666; font-size: 14px; }
        .error { background: #f8d7da; color: #721c24; border: 1px solid #f5c6cb; padding: 10px; }
        .figure { margin-top: 20px; }
"#;

fn index_html() -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Journal Tally</title>
    <style>{style}</style>
</head>
<body>
    <h1>Journal Tally</h1>
    <form class="panel" method="post" action="/run">
        <label>Journal names (one per line):</label>
        <textarea name="journal_names"></textarea>

        <div class="form-row">
            <div>
                <label>Text terms:</label>
                <textarea name="text_terms"></textarea>
            </div>
            <div>
                <label>MeSH terms:</label>
                <textarea name="mesh_terms"></textarea>
            </div>
        </div>

        <div class="form-row">
            <div>
                <label>Keywords (one column each):</label>
                <textarea name="keywords"></textarea>
            </div>
            <div>
                <label>Author names:</label>
                <textarea name="author_names"></textarea>
            </div>
        </div>

        <label>Custom expression:</label>
        <input type="text" name="custom_expression" placeholder="e.g. humans[mh] NOT review[pt]">

        <div class="form-row">
            <div>
                <label>From date:</label>
                <input type="date" name="from_date">
            </div>
            <div>
                <label>To date:</label>
                <input type="date" name="to_date">
            </div>
        </div>

        <div class="form-row">
            <div>
                <label>Interval (years):</label>
                <input type="number" name="date_interval_in_years" value="1" min="1">
            </div>
            <div>
                <label>Mode:</label>
                <select name="mode">
                    <option value="">Automatic</option>
                    <option value="date-ranges">Journal × date range</option>
                    <option value="keywords">Journal × keyword</option>
                    <option value="authors">Authors</option>
                </select>
            </div>
        </div>

        <label>Date field:</label>
        <select name="date_field">
            <option value="long">[Date - Publication], YYYY/MM/DD</option>
            <option value="short">[PDAT], MM/DD/YYYY</option>
        </select>

        <br><br>
        <button type="submit">Run</button>
    </form>
</body>
</html>"#,
        style = STYLE
    )
}

fn response_html(page: &RunPage) -> String {
    let summary = &page.summary;
    let mut totals = String::new();
    if let (Some(selected), Some(total)) =
        (summary.selected_search_count, summary.total_search_count)
    {
        totals = format!(
            "<p>Selected articles: <b>{}</b> of <b>{}</b></p>",
            selected, total
        );
    }
    let figure = page
        .figure_svg
        .as_deref()
        .map(|svg| format!(r#"<div class="figure">{}</div>"#, svg))
        .unwrap_or_default();
    let archive = escape_html(&page.archive_name);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Journal Tally results</title>
    <style>{style}</style>
</head>
<body>
    <h1>Results</h1>
    <div class="panel">
        <p class="info">{searches} searches run</p>
        {totals}
        <a class="button" href="/download/{archive}">Download {archive}</a>
        {figure}
        <p><a href="/">New search</a></p>
    </div>
</body>
</html>"#,
        style = STYLE,
        searches = summary.search_count,
        totals = totals,
        archive = archive,
        figure = figure
    )
}

fn error_html(err: &TallyError) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Journal Tally error</title>
    <style>{style}</style>
</head>
<body>
    <h1>Run failed</h1>
    <div class="panel">
        <div class="error">{message}</div>
        <p><a href="/">Back</a></p>
    </div>
</body>
</html>"#,
        style = STYLE,
        message = escape_html(&err.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubSource;

    fn form_body(fields: &[(&str, &str)]) -> String {
        fields
            .iter()
            .map(|(k, v)| {
                let encoded: String = v
                    .bytes()
                    .map(|b| match b {
                        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' => {
                            (b as char).to_string()
                        }
                        _ => format!("%{:02X}", b),
                    })
                    .collect();
                format!("{}={}", k, encoded)
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    #[test]
    fn form_normalizes_lists_and_drops_bad_dates() {
        let form = RunForm {
            journal_names: "Nature\r\nnature\r\nCell".into(),
            from_date: "2010-01-01".into(),
            to_date: "not a date".into(),
            date_interval_in_years: "2".into(),
            custom_expression: "  humans[mh]  ".into(),
            date_field: "short".into(),
            ..Default::default()
        };
        let request = form.into_request();

        assert_eq!(request.journal_names, vec!["Cell", "Nature"]);
        assert_eq!(request.from_date, None);
        assert_eq!(request.to_date, None);
        assert_eq!(request.date_interval_in_years, Some(2));
        assert_eq!(request.custom_expression.as_deref(), Some("humans[mh]"));
        assert_eq!(request.date_field, DateField::PublicationDateShort);
        assert_eq!(request.mode, None);
    }

    #[test]
    fn locate_only_uses_basename() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("abc.zip"), b"zip").unwrap();

        assert!(store.locate("abc.zip").is_some());
        assert!(store.locate("../../abc.zip").is_some());
        assert!(store.locate("..").is_none());
        assert!(store.locate("missing.zip").is_none());
    }

    #[test]
    fn archive_names_are_unique() {
        let a = ResultsStore::new_archive_name();
        let b = ResultsStore::new_archive_name();
        assert!(a.ends_with(".zip"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn index_serves_form() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::open(dir.path()).unwrap();
        let filter = routes(store, Arc::new(StubSource::new()));

        let response = warp::test::request().path("/").reply(&filter).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(body.contains(r#"action="/run""#));
    }

    #[tokio::test]
    async fn run_archives_results_and_links_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::open(dir.path()).unwrap();
        let filter = routes(store, Arc::new(StubSource::new().with_fallback(5)));

        let body = form_body(&[
            ("journal_names", "Cell\nNature"),
            ("text_terms", "crispr"),
            ("from_date", "01/01/2010"),
            ("to_date", "12/31/2011"),
        ]);
        let response = warp::test::request()
            .method("POST")
            .path("/run")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(html.contains("8 searches run"));
        assert!(html.contains("<svg"));

        let archives: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(archives.len(), 1);
        let name = archives[0].as_ref().unwrap().file_name();
        let name = name.to_string_lossy();
        assert!(html.contains(&format!("/download/{}", name)));

        let download = warp::test::request()
            .path(&format!("/download/{}", name))
            .reply(&filter)
            .await;
        assert_eq!(download.status(), StatusCode::OK);
        assert_eq!(
            download.headers()[header::CONTENT_TYPE],
            "application/zip"
        );
    }

    #[tokio::test]
    async fn reversed_dates_are_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::open(dir.path()).unwrap();
        let source = Arc::new(StubSource::new().with_fallback(5));
        let filter = routes(store, source.clone());

        let body = form_body(&[
            ("journal_names", "Cell"),
            ("from_date", "05/01/2020"),
            ("to_date", "01/01/2019"),
        ]);
        let response = warp::test::request()
            .method("POST")
            .path("/run")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(source.calls().is_empty());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unknown_download_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::open(dir.path()).unwrap();
        let filter = routes(store, Arc::new(StubSource::new()));

        let response = warp::test::request()
            .path("/download/nothing.zip")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_outside_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let store = ResultsStore::open(dir.path()).unwrap();
        let filter = routes(store, Arc::new(StubSource::new()));

        for path in ["/download/notes.txt", "/download/..%2Fsecret.zip"] {
            let response = warp::test::request().path(path).reply(&filter).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", path);
        }
    }
}
