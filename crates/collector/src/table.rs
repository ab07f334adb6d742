//! Header-keyed tables read from CSV, spreadsheet and HTML queue reports.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use power_models::MonitorError;
use scraper::{Html, Selector};
use std::io::Cursor;

const HEADER_SCAN_ROWS: usize = 10;
const CAPACITY_HEADER_HINTS: &[&str] = &["MW", "CAPACITY", "SIZE", "OUTPUT"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Builds a table from a raw grid, locating the header row first.
    ///
    /// Queue reports often start with title or disclaimer rows, so the header is the first
    /// of the leading rows that is at least half filled and names a capacity-like column.
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        let half_filled = |row: &Vec<String>| {
            let filled = row.iter().filter(|c| !c.trim().is_empty()).count();
            filled > 0 && filled * 2 >= width
        };

        let scan = grid.len().min(HEADER_SCAN_ROWS);
        let header_idx = (0..scan)
            .find(|&i| {
                half_filled(&grid[i])
                    && grid[i].iter().any(|cell| {
                        let upper = cell.to_uppercase();
                        CAPACITY_HEADER_HINTS.iter().any(|hint| upper.contains(hint))
                    })
            })
            .or_else(|| (0..scan).find(|&i| half_filled(&grid[i])))
            .unwrap_or(0);

        let mut rows = grid.into_iter().skip(header_idx);
        let headers = rows
            .next()
            .map(|h| h.into_iter().map(|c| c.trim().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
            .collect();

        Self { headers, rows }
    }

    pub fn from_csv(source: &str, text: &str) -> Result<Self, MonitorError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut grid = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| MonitorError::parse(source, e))?;
            grid.push(record.iter().map(|c| c.trim().to_string()).collect());
        }
        Ok(Self::from_grid(grid))
    }

    /// Reads the first worksheet of an XLSX, XLSB, XLS or ODS workbook.
    pub fn from_workbook(source: &str, bytes: &[u8]) -> Result<Self, MonitorError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| MonitorError::parse(source, e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| MonitorError::parse(source, "workbook has no worksheets"))?
            .map_err(|e| MonitorError::parse(source, e))?;

        let grid = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        Ok(Self::from_grid(grid))
    }

    /// Reads the first `<table>` of an HTML page: `th` cells are headers, rows need at least
    /// as many `td` cells as there are headers.
    pub fn from_html(source: &str, html: &str) -> Result<Self, MonitorError> {
        let document = Html::parse_document(html);
        let table_sel = selector(source, "table")?;
        let th_sel = selector(source, "th")?;
        let tr_sel = selector(source, "tr")?;
        let td_sel = selector(source, "td")?;

        let table = document
            .select(&table_sel)
            .next()
            .ok_or_else(|| MonitorError::parse(source, "no table found in page"))?;

        let headers: Vec<String> = table.select(&th_sel).map(element_text).collect();
        let rows = table
            .select(&tr_sel)
            .map(|tr| tr.select(&td_sel).map(element_text).collect::<Vec<_>>())
            .filter(|cells| !cells.is_empty() && cells.len() >= headers.len())
            .collect();

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first candidate header present, compared case-insensitively.
    pub fn column(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|name| {
            self.headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name.trim()))
        })
    }

    /// Index of the first header containing one of `fragments`, trying fragments in order.
    pub fn column_containing(&self, fragments: &[&str]) -> Option<usize> {
        fragments.iter().find_map(|fragment| {
            let fragment = fragment.to_lowercase();
            self.headers
                .iter()
                .position(|h| h.to_lowercase().contains(&fragment))
        })
    }

    /// Every column whose header mentions one of `keywords`.
    pub fn columns_matching(&self, keywords: &[&str]) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| {
                let upper = h.to_uppercase();
                keywords.iter().any(|k| upper.contains(&k.to_uppercase()))
            })
            .map(|(i, _)| i)
            .collect()
    }
}

/// Cell text for an optional column; missing columns and short rows read as empty.
pub fn cell(row: &[String], column: Option<usize>) -> &str {
    column
        .and_then(|i| row.get(i))
        .map(|c| c.as_str())
        .unwrap_or("")
}

fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

fn selector(source: &str, css: &str) -> Result<Selector, MonitorError> {
    Selector::parse(css).map_err(|e| MonitorError::parse(source, format!("{e:?}")))
}

fn element_text(element: scraper::ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
