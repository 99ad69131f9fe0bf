use crate::core::config::Config;
use crate::core::dictionary::DictionaryLayout;
use crate::error::Result;
use dialoguer::Confirm;

fn describe(layout: &DictionaryLayout) -> Result<u64> {
    let size_kb = layout.size_on_disk()? / 1024;
    println!(
        "Dictionary files in {:?} occupy {size_kb} kB.",
        layout.base_dir()
    );
    Ok(size_kb)
}

/// Shows what would be removed.
pub fn cleanup_dry_run() -> Result<()> {
    let config = Config::load()?;
    let layout = config.layout();

    if !layout.base_dir().exists() {
        println!("No dictionary files to remove.");
        return Ok(());
    }
    describe(&layout)?;
    println!();
    println!("Run 'aedict cleanup --confirm' to delete them.");
    Ok(())
}

pub fn cleanup_execute(assume_yes: bool) -> Result<()> {
    let config = Config::load()?;
    let layout = config.layout();

    if !layout.base_dir().exists() {
        println!("No dictionary files to remove.");
        return Ok(());
    }
    let size_kb = describe(&layout)?;

    if !assume_yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {size_kb} kB of dictionary files?"))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("Nothing removed.");
            return Ok(());
        }
    }

    match layout.remove_all() {
        Ok(()) => {
            println!("✅ Dictionary files removed.");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to clean dictionary files");
            Err(e)
        }
    }
}
