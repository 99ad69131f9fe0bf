use crate::core::config::Config;
use crate::error::Result;

pub fn show_config() -> Result<()> {
    let config = Config::load()?;
    println!("Dictionary directory:  {:?}", config.base_dir);
    println!("Dictionary base URL:   {}", config.dictionary_base_url);
    println!("Always available:      {}", config.always_available);
    Ok(())
}

pub fn set_always_available(enabled: bool) -> Result<()> {
    let mut config = Config::load()?;
    config.set_always_available(enabled)?;
    println!("Always available set to {enabled}.");
    Ok(())
}
