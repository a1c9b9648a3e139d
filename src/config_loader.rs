use crate::config::BranchConfig;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and parse a branch file
pub fn load_config(config_path: &Path) -> Result<BranchConfig> {
    info!("Loading branch configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open branch file '{}'", config_path.display()))?;

    let config: BranchConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse branch file '{}'", config_path.display()))?;

    config.validate()?;

    info!(
        "Loaded circuit {} with {} device(s)",
        config.circuit.name,
        config.devices.len()
    );
    Ok(config)
}
