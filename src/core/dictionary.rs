//! On-disk layout of downloaded dictionary indexes.

use crate::core::fetch::{is_complete, FetchRequest};
use crate::error::{AedictError, Result};
use crate::utils::fs;
use reqwest::Url;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Zipped Lucene index of the EDICT dictionary.
pub const EDICT_LUCENE_ZIP: &str = "http://baka.sk/aedict/edict-lucene.zip";
/// Zipped Lucene index of the KANJIDIC dictionary.
pub const KANJIDIC_LUCENE_ZIP: &str = "http://baka.sk/aedict/kanjidic-lucene.zip";

/// Approximate unpacked sizes, used as progress bounds when the archive
/// does not declare entry sizes.
pub const EDICT_EXPECTED_SIZE: u64 = 20 * 1024 * 1024;
pub const KANJIDIC_EXPECTED_SIZE: u64 = 15 * 1024 * 1024;

/// Name under which the main EDICT index is listed.
pub const DEFAULT_DICTIONARY_NAME: &str = "Default";

const EDICT_DIR: &str = "index";
const KANJIDIC_DIR: &str = "index-kanjidic";
const EXTRA_DIR_PREFIX: &str = "index-";

/// The two dictionaries every installation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinDictionary {
    Edict,
    Kanjidic,
}

impl BuiltinDictionary {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "edict" => Some(BuiltinDictionary::Edict),
            "kanjidic" => Some(BuiltinDictionary::Kanjidic),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BuiltinDictionary::Edict => "EDICT",
            BuiltinDictionary::Kanjidic => "KANJIDIC",
        }
    }

    fn source(self) -> &'static str {
        match self {
            BuiltinDictionary::Edict => EDICT_LUCENE_ZIP,
            BuiltinDictionary::Kanjidic => KANJIDIC_LUCENE_ZIP,
        }
    }

    fn expected_size(self) -> u64 {
        match self {
            BuiltinDictionary::Edict => EDICT_EXPECTED_SIZE,
            BuiltinDictionary::Kanjidic => KANJIDIC_EXPECTED_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryLayout {
    base_dir: PathBuf,
}

impl DictionaryLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn edict_dir(&self) -> PathBuf {
        self.base_dir.join(EDICT_DIR)
    }

    pub fn kanjidic_dir(&self) -> PathBuf {
        self.base_dir.join(KANJIDIC_DIR)
    }

    /// Directory of an additional dictionary downloaded from the catalog.
    pub fn extra_dir(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{EXTRA_DIR_PREFIX}{name}"))
    }

    pub fn builtin_dir(&self, dict: BuiltinDictionary) -> PathBuf {
        match dict {
            BuiltinDictionary::Edict => self.edict_dir(),
            BuiltinDictionary::Kanjidic => self.kanjidic_dir(),
        }
    }

    pub fn builtin_request(&self, dict: BuiltinDictionary) -> Result<FetchRequest> {
        let source = Url::parse(dict.source())
            .map_err(|e| AedictError::config_error(format!("invalid source URL: {e}")))?;
        Ok(FetchRequest::new(
            source,
            self.builtin_dir(dict),
            dict.display_name(),
            dict.expected_size(),
        ))
    }

    /// Every complete EDICT-format dictionary, keyed by name.
    ///
    /// The main EDICT index is listed as [`DEFAULT_DICTIONARY_NAME`];
    /// KANJIDIC is not an EDICT dictionary and is never listed.
    pub fn installed(&self) -> Result<BTreeMap<String, PathBuf>> {
        let mut result = BTreeMap::new();
        if !self.base_dir.is_dir() {
            return Ok(result);
        }

        let edict = self.edict_dir();
        if is_complete(&edict) {
            result.insert(DEFAULT_DICTIONARY_NAME.to_string(), edict);
        }

        let kanjidic = self.kanjidic_dir();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path == kanjidic {
                continue;
            }
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(EXTRA_DIR_PREFIX))
            else {
                continue;
            };
            if name.is_empty() || !is_complete(&path) {
                continue;
            }
            result.insert(name.to_string(), path);
        }
        Ok(result)
    }

    pub fn size_on_disk(&self) -> Result<u64> {
        fs::dir_size(&self.base_dir)
    }

    /// Deletes every downloaded dictionary.
    pub fn remove_all(&self) -> Result<()> {
        tracing::info!(path = %self.base_dir.display(), "Removing dictionary files");
        fs::remove_dir_recursive(&self.base_dir)
    }
}
