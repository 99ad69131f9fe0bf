use crate::commands::progress::TerminalProgress;
use crate::core::catalog::CatalogClient;
use crate::core::config::Config;
use crate::core::dictionary::BuiltinDictionary;
use crate::core::fetch::{FetchOutcome, FetchRequest, Fetcher};
use crate::core::source::HttpSource;
use crate::core::task::FetchTask;
use crate::error::{AedictError, Result};
use std::sync::Arc;

/// Resolves `name` to a fetch request: `edict` and `kanjidic` are built in,
/// anything else is looked up in the catalog.
pub fn resolve_request(config: &Config, name: &str) -> Result<FetchRequest> {
    let layout = config.layout();
    if let Some(builtin) = BuiltinDictionary::from_name(name) {
        return layout.builtin_request(builtin);
    }

    let client = CatalogClient::new(Arc::new(HttpSource::new()?), &config.dictionary_base_url);
    Ok(client.find(name)?.fetch_request(&layout))
}

pub fn download_dictionary(name: &str) -> Result<()> {
    let config = Config::load()?;
    let request = resolve_request(&config, name)?;
    let dict_name = request.name.clone();

    println!("Downloading {dict_name} into {:?}", request.target_dir);

    let fetcher = Arc::new(Fetcher::http()?);
    let task = FetchTask::start(fetcher, request)?;

    let cancel = task.cancel_handle();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let mut progress = TerminalProgress::new();
    let outcome = task.join(&mut progress);
    progress.finish();

    match outcome {
        FetchOutcome::AlreadyComplete => {
            println!("{dict_name} is already downloaded.");
            Ok(())
        }
        FetchOutcome::Downloaded { bytes, entries } => {
            println!(
                "✅ {dict_name} downloaded: {entries} files, {} kB",
                bytes / 1024
            );
            Ok(())
        }
        FetchOutcome::Cancelled => {
            println!("Download of {dict_name} cancelled.");
            Ok(())
        }
        FetchOutcome::Failed(error) => Err(AedictError::DownloadFailed {
            name: dict_name,
            message: error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DEFAULT_DICTIONARY_BASE_URL;
    use crate::core::dictionary::EDICT_LUCENE_ZIP;
    use std::path::PathBuf;

    #[test]
    fn test_resolve_builtin_without_catalog() {
        let config = Config {
            base_dir: PathBuf::from("/data/aedict"),
            dictionary_base_url: DEFAULT_DICTIONARY_BASE_URL.to_string(),
            always_available: false,
        };

        let request = resolve_request(&config, "EDICT").unwrap();
        assert_eq!(request.source.as_str(), EDICT_LUCENE_ZIP);
        assert_eq!(request.target_dir, PathBuf::from("/data/aedict/index"));
    }
}
