use std::path::Path;

use skald_core::config::EngineConfig;
use skald_engine::LoadOptions;

pub fn execute(file: &Path, json: bool, config: &EngineConfig) -> anyhow::Result<()> {
    let opts = LoadOptions {
        config: config.clone(),
        file_open_ms: None,
    };
    let trace = skald_engine::load_with_options(file, &opts)?;
    let warnings = trace.timeline.warnings();

    if warnings.is_empty() {
        println!("No warnings.");
        return Ok(());
    }

    if json {
        for w in warnings {
            println!("{}", serde_json::to_string(w)?);
        }
    } else {
        for w in warnings {
            println!("{w}");
        }
        println!("\n({} warnings)", warnings.len());
    }
    Ok(())
}
