use crate::core::catalog::CatalogClient;
use crate::core::config::Config;
use crate::core::dictionary::{BuiltinDictionary, DEFAULT_DICTIONARY_NAME};
use crate::core::fetch::is_complete;
use crate::core::source::HttpSource;
use crate::error::Result;
use std::sync::Arc;

pub fn list_available() -> Result<()> {
    let config = Config::load()?;
    let layout = config.layout();
    let client = CatalogClient::new(Arc::new(HttpSource::new()?), &config.dictionary_base_url);

    let dictionaries = client.available(&layout)?;
    if dictionaries.is_empty() {
        println!("All dictionaries from the catalog are already downloaded.");
        return Ok(());
    }

    println!("Dictionaries available for download:");
    println!();
    for dict in &dictionaries {
        println!("  {dict}");
    }
    println!();
    println!("Download: aedict download <name>");
    Ok(())
}

pub fn list_installed() -> Result<()> {
    let config = Config::load()?;
    let layout = config.layout();

    println!("Dictionary directory: {:?}", layout.base_dir());
    println!();

    for builtin in [BuiltinDictionary::Edict, BuiltinDictionary::Kanjidic] {
        let status = if is_complete(&layout.builtin_dir(builtin)) {
            "✅ installed"
        } else {
            "❌ missing"
        };
        println!("  {:<10} {status}", builtin.display_name());
    }

    let installed = layout.installed()?;
    let extras: Vec<&String> = installed
        .keys()
        .filter(|name| name.as_str() != DEFAULT_DICTIONARY_NAME)
        .collect();
    if !extras.is_empty() {
        println!();
        println!("Additional dictionaries:");
        for name in extras {
            println!("  {name}");
        }
    }
    Ok(())
}
