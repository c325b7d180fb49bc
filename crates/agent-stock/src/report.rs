//! Markdown report rendering, naming and the report index

use crate::error::{Result, StockError};
use chrono::{DateTime, Local, NaiveDateTime};
use minijinja::{Environment, context};
use regex::Regex;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// File name of the report index inside the output directory
pub const INDEX_FILE: &str = "README.md";

const REPORT_TEMPLATE_NAME: &str = "stock.report";
const INDEX_TEMPLATE_NAME: &str = "stock.report_index";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const REPORT_TEMPLATE: &str = r"# Stock Analysis Report

---

## Report Information

- **Generated**: {{ generated_at }}
- **Symbols**: {{ symbols | join(', ') }}
- **Methodology**: multi-dimension quantitative rating
- **Data source**: {{ data_source }}
- **Model**: {{ model }}

---

## Data Snapshot

{{ data }}

---

## Analysis

{{ analysis }}

---

## Disclaimer

This report was generated automatically and is for reference only. It is not investment advice. Its content rests on:
1. Market data that may be delayed
2. A quantitative model with known limitations
3. Model reasoning that may be biased

**Investing involves risk.** Make decisions independently and in line with your own risk tolerance and objectives, and consult a qualified financial adviser before acting.

---

## Technical Notes

- **Data interface**: {{ data_source }}
- **Reasoning backend**: {{ backend }} ({{ model }})
- **Rating framework**: five dimensions (fundamentals, technicals, growth, sentiment, sector risk)

---

*Generated automatically by stock-report*
";

const INDEX_TEMPLATE: &str = r"# Stock Analysis Reports

**Updated**: {{ updated_at }}

**Total reports**: {{ entries | length }}

---

## Reports

{% for entry in entries -%}
{% if entry.generated_at -%}
- [{{ entry.label }}]({{ entry.file_name }}) - {{ entry.generated_at }}
{% else -%}
- [{{ entry.file_name }}]({{ entry.file_name }})
{% endif -%}
{% else -%}
*No reports yet*
{% endfor %}";

static REPORT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^stock_analysis_(.+)_(\d{8}_\d{6})(?:_(\d+))?\.md$")
        .unwrap_or_else(|e| unreachable!("report name pattern is valid: {e}"))
});

/// Everything a report page shows
#[derive(Debug, Clone, Serialize)]
pub struct ReportContent<'a> {
    pub generated_at: DateTime<Local>,
    pub symbols: &'a [String],
    pub model: &'a str,
    pub data_source: &'a str,
    pub backend: &'a str,
    pub data: &'a str,
    pub analysis: &'a str,
}

/// One line of the report index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub file_name: String,
    /// Symbol part of the file name, e.g. `NVDA_AAPL`
    pub label: String,
    /// Parsed generation time, `None` for names that don't follow the scheme
    pub generated_at: Option<String>,
    #[serde(skip)]
    sort_key: Option<(NaiveDateTime, u32)>,
}

impl IndexEntry {
    /// Parse a report file name
    pub fn parse(file_name: &str) -> Option<Self> {
        if !file_name.starts_with("stock_analysis_") || !file_name.ends_with(".md") {
            return None;
        }

        let parsed = REPORT_NAME.captures(file_name).and_then(|caps| {
            let label = caps.get(1)?.as_str().to_string();
            let at = NaiveDateTime::parse_from_str(caps.get(2)?.as_str(), TIMESTAMP_FORMAT).ok()?;
            let seq = caps.get(3).map_or(Some(1), |m| m.as_str().parse().ok())?;
            Some((label, at, seq))
        });

        Some(match parsed {
            Some((label, at, seq)) => Self {
                file_name: file_name.to_string(),
                label,
                generated_at: Some(at.format("%Y-%m-%d %H:%M:%S").to_string()),
                sort_key: Some((at, seq)),
            },
            None => Self {
                file_name: file_name.to_string(),
                label: file_name.to_string(),
                generated_at: None,
                sort_key: None,
            },
        })
    }
}

/// Base file name for a report: first three symbols without their market
/// suffix, then the generation time
///
/// Characters outside `[A-Za-z0-9-]` become `-`, so a symbol such as
/// `BRK/B.US` can never name a path outside the output directory.
pub fn report_file_stem(symbols: &[String], at: DateTime<Local>) -> String {
    let codes: Vec<String> = symbols
        .iter()
        .take(3)
        .map(|s| {
            s.split('.')
                .next()
                .unwrap_or(s.as_str())
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
                .collect()
        })
        .collect();
    format!(
        "stock_analysis_{}_{}",
        codes.join("_"),
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Writes reports and maintains the index in one output directory
#[derive(Debug)]
pub struct ReportWriter {
    output_dir: PathBuf,
    env: Environment<'static>,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(REPORT_TEMPLATE_NAME, REPORT_TEMPLATE)?;
        env.add_template(INDEX_TEMPLATE_NAME, INDEX_TEMPLATE)?;
        Ok(Self {
            output_dir: output_dir.into(),
            env,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render a full report page
    pub fn render(&self, content: &ReportContent<'_>) -> Result<String> {
        let rendered = self.env.get_template(REPORT_TEMPLATE_NAME)?.render(context! {
            generated_at => content.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            symbols => content.symbols,
            model => content.model,
            data_source => content.data_source,
            backend => content.backend,
            data => content.data.trim(),
            analysis => content.analysis.trim(),
        })?;
        Ok(rendered)
    }

    /// Write a rendered report under a name that doesn't exist yet
    ///
    /// Returns the path written.
    pub async fn write(&self, rendered: &str, symbols: &[String], at: DateTime<Local>) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| StockError::io(&self.output_dir, e))?;

        let stem = report_file_stem(symbols, at);
        let mut seq = 1u32;
        loop {
            let name = if seq == 1 {
                format!("{stem}.md")
            } else {
                format!("{stem}_{seq}.md")
            };
            let path = self.output_dir.join(name);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(rendered.as_bytes())
                        .await
                        .map_err(|e| StockError::io(&path, e))?;
                    file.flush().await.map_err(|e| StockError::io(&path, e))?;
                    debug!("Report written to {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => seq += 1,
                Err(e) => return Err(StockError::io(&path, e)),
            }
        }
    }

    /// List report files, newest first
    pub async fn list_reports(&self) -> Result<Vec<IndexEntry>> {
        let mut dir = tokio::fs::read_dir(&self.output_dir)
            .await
            .map_err(|e| StockError::io(&self.output_dir, e))?;

        let mut entries = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| StockError::io(&self.output_dir, e))?
        {
            if let Some(entry) = item.file_name().to_str().and_then(IndexEntry::parse) {
                entries.push(entry);
            }
        }

        // Dated entries newest first, then anything unparseable by name
        entries.sort_by(|a, b| match (&a.sort_key, &b.sort_key) {
            (Some(ka), Some(kb)) => kb.cmp(ka).then_with(|| a.file_name.cmp(&b.file_name)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.file_name.cmp(&b.file_name),
        });
        Ok(entries)
    }

    /// Render the index page for the given entries
    pub fn render_index(&self, entries: &[IndexEntry], updated_at: DateTime<Local>) -> Result<String> {
        let rendered = self.env.get_template(INDEX_TEMPLATE_NAME)?.render(context! {
            updated_at => updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            entries => entries,
        })?;
        Ok(rendered)
    }

    /// Rewrite the index from the reports currently on disk
    pub async fn update_index(&self) -> Result<PathBuf> {
        let entries = self.list_reports().await?;
        let rendered = self.render_index(&entries, Local::now())?;
        let path = self.output_dir.join(INDEX_FILE);
        tokio::fs::write(&path, rendered)
            .await
            .map_err(|e| StockError::io(&path, e))?;
        debug!("Report index updated with {} entries", entries.len());
        Ok(path)
    }
}
