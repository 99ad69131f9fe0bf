//! Catalog of additional dictionaries available for download.
//!
//! The catalog is a UTF-8 text file with one `FILE_NAME,DISPLAY_NAME,ZIPPED_SIZE`
//! line per dictionary. Blank lines are ignored; any other malformed line
//! fails the whole listing.

use crate::core::dictionary::DictionaryLayout;
use crate::core::fetch::FetchRequest;
use crate::core::source::ByteSource;
use crate::error::{AedictError, Result};
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;

pub const CATALOG_FILE: &str = "dictionaries.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadableDictionary {
    pub name: String,
    pub url: Url,
    /// Size of the zip file in bytes.
    pub zipped_size: u64,
}

impl DownloadableDictionary {
    /// Request that downloads this dictionary into its own directory.
    pub fn fetch_request(&self, layout: &DictionaryLayout) -> FetchRequest {
        FetchRequest::new(
            self.url.clone(),
            layout.extra_dir(&self.name),
            self.name.clone(),
            self.zipped_size,
        )
    }
}

impl fmt::Display for DownloadableDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}kB)", self.name, self.zipped_size / 1024)
    }
}

pub fn parse_line(base_url: &str, line: &str) -> Result<DownloadableDictionary> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let [file_name, name, size] = fields.as_slice() else {
        return Err(AedictError::catalog_parse(
            line,
            format!("expected 3 fields, found {}", fields.len()),
        ));
    };
    if file_name.is_empty() || name.is_empty() {
        return Err(AedictError::catalog_parse(line, "empty file or dictionary name"));
    }
    // The name becomes part of the install directory.
    if name.contains(['/', '\\', '\0']) || name.contains("..") {
        return Err(AedictError::catalog_parse(
            line,
            format!("dictionary name '{name}' is not a plain directory name"),
        ));
    }

    let url = Url::parse(&format!("{base_url}{file_name}"))
        .map_err(|e| AedictError::catalog_parse(line, format!("invalid URL: {e}")))?;
    let zipped_size = size
        .parse::<u64>()
        .map_err(|e| AedictError::catalog_parse(line, format!("invalid size: {e}")))?;

    Ok(DownloadableDictionary {
        name: name.to_string(),
        url,
        zipped_size,
    })
}

/// Parses a whole catalog. Later lines win over earlier ones of the same name.
pub fn parse_catalog(base_url: &str, reader: impl Read) -> Result<Vec<DownloadableDictionary>> {
    let mut by_name: HashMap<String, DownloadableDictionary> = HashMap::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let dict = parse_line(base_url, &line)?;
        by_name.insert(dict.name.clone(), dict);
    }

    let mut dictionaries: Vec<DownloadableDictionary> = by_name.into_values().collect();
    sort_by_name(&mut dictionaries);
    Ok(dictionaries)
}

fn sort_by_name(dictionaries: &mut [DownloadableDictionary]) {
    dictionaries.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
}

pub struct CatalogClient {
    source: Arc<dyn ByteSource>,
    base_url: String,
}

impl CatalogClient {
    pub fn new(source: Arc<dyn ByteSource>, base_url: impl Into<String>) -> Self {
        Self {
            source,
            base_url: base_url.into(),
        }
    }

    pub fn catalog_url(&self) -> Result<Url> {
        Url::parse(&format!("{}{CATALOG_FILE}", self.base_url))
            .map_err(|e| AedictError::config_error(format!("invalid catalog URL: {e}")))
    }

    /// Downloads and parses the full catalog.
    pub fn fetch_all(&self) -> Result<Vec<DownloadableDictionary>> {
        let url = self.catalog_url()?;
        tracing::info!(%url, "Downloading dictionary list");
        let reader = self.source.open(&url)?;
        parse_catalog(&self.base_url, reader)
    }

    /// Catalog entries that are not installed yet, sorted by name.
    pub fn available(&self, layout: &DictionaryLayout) -> Result<Vec<DownloadableDictionary>> {
        let installed = layout.installed()?;
        let mut dictionaries = self.fetch_all()?;
        dictionaries.retain(|d| !installed.contains_key(&d.name));
        Ok(dictionaries)
    }

    /// Finds a catalog entry by name, ignoring case.
    pub fn find(&self, name: &str) -> Result<DownloadableDictionary> {
        self.fetch_all()?
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| AedictError::DictionaryNotFound {
                name: name.to_string(),
            })
    }
}
