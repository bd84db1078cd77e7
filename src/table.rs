use std::collections::HashSet;
use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

use crate::error::MycoError;
use crate::http;
use crate::layout::ensure_dir;

const LINK_SUFFIX: &str = "_link";
const NAME_COLUMN: &str = "Name";
const PUBLISHED_COLUMN: &str = "Published";

pub trait PortalPageClient: Send + Sync {
    fn fetch_html(&self, url: &str) -> Result<String, MycoError>;
}

#[derive(Clone)]
pub struct MycocosmHttpClient {
    client: Client,
}

impl MycocosmHttpClient {
    pub fn new() -> Result<Self, MycoError> {
        let client = http::build_client(HeaderMap::new(), Duration::from_secs(60))?;
        Ok(Self { client })
    }
}

impl PortalPageClient for MycocosmHttpClient {
    fn fetch_html(&self, url: &str) -> Result<String, MycoError> {
        let response = http::send_with_retries(|| self.client.get(url))?;
        http::text_or_status(response)
    }
}

/// One genome portal row: the visible cell texts plus the two values
/// derived from cell links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRow {
    pub cells: Vec<String>,
    pub portal: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalTable {
    pub headers: Vec<String>,
    pub rows: Vec<PortalRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableResult {
    pub url: String,
    pub output: String,
    pub rows: usize,
    pub written: bool,
    pub error: Option<String>,
}

struct RawCell {
    text: String,
    link: Option<String>,
}

/// Parses the first `<table>` on the page. Every cell keeps its text and the
/// absolute href of its first anchor; `portal` is the `Name` link with
/// `portal_prefix` removed and `reference` is the `Published` link. Header
/// columns that themselves end in `_link` are dropped from the output.
pub fn parse_portal_table(
    html: &str,
    page_url: &str,
    portal_prefix: &str,
) -> Result<PortalTable, MycoError> {
    let base = Url::parse(page_url).map_err(|err| MycoError::Html(format!("{page_url}: {err}")))?;
    let document = Html::parse_document(html);
    let table = document
        .select(&selector("table")?)
        .next()
        .ok_or_else(|| MycoError::TableNotFound(page_url.to_string()))?;

    let headers: Vec<String> = table.select(&selector("th")?).map(stripped_text).collect();
    let name_idx = column_index(&headers, NAME_COLUMN)?;
    let published_idx = column_index(&headers, PUBLISHED_COLUMN)?;

    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;
    let anchor_selector = selector("a")?;

    let mut rows = Vec::new();
    for (index, tr) in table.select(&row_selector).enumerate().skip(1) {
        let cells: Vec<RawCell> = tr
            .select(&cell_selector)
            .map(|td| RawCell {
                text: stripped_text(td),
                link: td
                    .select(&anchor_selector)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .filter(|href| !href.is_empty())
                    .and_then(|href| base.join(href).ok())
                    .map(|url| url.to_string()),
            })
            .collect();
        if cells.is_empty() {
            continue;
        }
        if cells.len() > headers.len() {
            return Err(MycoError::Html(format!(
                "row {index} has {} cells but the table has {} columns",
                cells.len(),
                headers.len()
            )));
        }

        let link_at = |idx: usize| cells.get(idx).and_then(|cell| cell.link.clone());
        let portal = link_at(name_idx).map(|link| {
            link.strip_prefix(portal_prefix)
                .map(str::to_string)
                .unwrap_or(link)
        });
        let reference = link_at(published_idx);

        let mut texts: Vec<String> = cells.into_iter().map(|cell| cell.text).collect();
        texts.resize(headers.len(), String::new());
        rows.push(PortalRow {
            cells: texts,
            portal,
            reference,
        });
    }

    let mut seen = HashSet::new();
    for portal in rows.iter().filter_map(|row| row.portal.as_deref()) {
        if !seen.insert(portal) {
            return Err(MycoError::DuplicatePortal(portal.to_string()));
        }
    }

    let keep: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !header.ends_with(LINK_SUFFIX))
        .map(|(idx, _)| idx)
        .collect();
    let headers = keep.iter().map(|&idx| headers[idx].clone()).collect();
    let rows = rows
        .into_iter()
        .map(|row| PortalRow {
            cells: keep.iter().map(|&idx| row.cells[idx].clone()).collect(),
            ..row
        })
        .collect();

    Ok(PortalTable { headers, rows })
}

pub fn write_portal_table(table: &PortalTable, path: &Utf8Path) -> Result<(), MycoError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut writer = csv::Writer::from_path(path.as_std_path())?;
    let mut header = table.headers.clone();
    header.push("portal".to_string());
    header.push("reference".to_string());
    writer.write_record(&header)?;
    for row in &table.rows {
        let mut record = row.cells.clone();
        record.push(row.portal.clone().unwrap_or_default());
        record.push(row.reference.clone().unwrap_or_default());
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|err| MycoError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Downloads, parses and writes the genome-portal table. Never fails:
/// problems are logged and reported in the result, and no file is written.
pub fn fetch_portal_table<C: PortalPageClient + ?Sized>(
    client: &C,
    url: &str,
    portal_prefix: &str,
    output: &Utf8Path,
) -> TableResult {
    let outcome = client
        .fetch_html(url)
        .and_then(|html| parse_portal_table(&html, url, portal_prefix))
        .and_then(|table| write_portal_table(&table, output).map(|_| table.rows.len()));

    match outcome {
        Ok(rows) => {
            tracing::info!(%output, rows, "saved genome portal table");
            TableResult {
                url: url.to_string(),
                output: output.to_string(),
                rows,
                written: true,
                error: None,
            }
        }
        Err(err) => {
            tracing::error!(%url, error = %err, "failed to build genome portal table");
            TableResult {
                url: url.to_string(),
                output: output.to_string(),
                rows: 0,
                written: false,
                error: Some(err.to_string()),
            }
        }
    }
}

fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn column_index(headers: &[String], name: &str) -> Result<usize, MycoError> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| MycoError::MissingColumn(name.to_string()))
}

fn selector(css: &str) -> Result<Selector, MycoError> {
    Selector::parse(css).map_err(|err| MycoError::Html(format!("selector {css}: {err}")))
}
