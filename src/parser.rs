use chrono::NaiveDate;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::AppError;

/// Marker class the timetable page puts on class section header rows.
const ACTIVE_ROW_SELECTOR: &str = "tr.table-active";
/// Header rows of the next class section start with this prefix.
const SECTION_PREFIX: &str = "Klasa";
/// Line segments per announcement row: the text before the first line break
/// plus the six announcement cells.
const MIN_ROW_SEGMENTS: usize = 7;

/// One substitute-lesson announcement, as stored and notified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub lesson_num: String,
    pub lesson_name: String,
    pub substitute: String,
    pub room: String,
    pub additional_info: String,
    pub teacher: String,
    /// ISO date of the timetable page the row came from.
    pub day: String,
}

impl Substitution {
    /// Split one raw row into the six announcement fields.
    ///
    /// The page renders each cell on its own line; segment 0 is the text
    /// before the first line break and carries no field. A shorter row means
    /// the page structure changed and has to be surfaced, not skipped.
    pub fn from_row_text(raw: &str, day: NaiveDate) -> Result<Self, AppError> {
        let segments: Vec<&str> = raw.split('\n').collect();
        if segments.len() < MIN_ROW_SEGMENTS {
            return Err(AppError::MalformedRow {
                expected: MIN_ROW_SEGMENTS,
                got: segments.len(),
                row: raw.trim().to_string(),
            });
        }
        Ok(Self {
            lesson_num: segments[1].trim().to_string(),
            lesson_name: segments[2].trim().to_string(),
            substitute: segments[3].trim().to_string(),
            room: segments[4].trim().to_string(),
            additional_info: segments[5].trim().to_string(),
            teacher: segments[6].trim().to_string(),
            day: day.format("%Y-%m-%d").to_string(),
        })
    }
}

/// Fetch the rendered timetable page for one day.
pub async fn fetch_day(
    client: &Client,
    url_template: &str,
    day: NaiveDate,
) -> Result<String, AppError> {
    let url = url_template.replace("{date}", &day.format("%Y-%m-%d").to_string());
    tracing::info!(url = %url, "Fetching timetable page");

    let resp = client.get(&url).send().await.map_err(|e| AppError::Fetch {
        url: url.clone(),
        reason: e.to_string(),
    })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(AppError::Fetch {
            url,
            reason: format!("HTTP {status}"),
        });
    }

    resp.text().await.map_err(|e| AppError::Fetch {
        url,
        reason: e.to_string(),
    })
}

/// Collect the raw announcement rows for one class.
///
/// The anchor is the first section header row whose text contains
/// `class_name` (substring match: the label is embedded in a longer header
/// like "Klasa 3A (wych. ...)"). Rows after the anchor belong to that class
/// until the next header row; blank spacer rows are dropped.
pub fn extract_rows(html: &str, class_name: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let active_sel = Selector::parse(ACTIVE_ROW_SELECTOR).unwrap();

    let anchor = document
        .select(&active_sel)
        .find(|row| row_text(row).contains(class_name));
    let Some(anchor) = anchor else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for node in anchor.next_siblings() {
        let Some(sibling) = ElementRef::wrap(node) else {
            continue;
        };
        let text = row_text(&sibling);
        if text.trim_start().starts_with(SECTION_PREFIX) {
            break;
        }
        if !text.trim().is_empty() {
            rows.push(text);
        }
    }
    rows
}

/// Extract and normalize every announcement for `class_name` on `day`'s page.
pub fn parse_substitutions(
    html: &str,
    class_name: &str,
    day: NaiveDate,
) -> Result<Vec<Substitution>, AppError> {
    extract_rows(html, class_name)
        .iter()
        .map(|raw| Substitution::from_row_text(raw, day))
        .collect()
}

fn row_text(row: &ElementRef) -> String {
    row.text().collect::<String>()
}
