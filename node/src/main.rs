use anyhow::Result;
use log::{error, info};

use node::settings::{self, Settings};

fn main() -> Result<()> {
    env_logger::init();

    let path = settings::config_path_from_env()?;
    let settings = Settings::load(&path)?;
    info!("loaded settings from {}", path.display());

    match node::run(&settings) {
        Ok(params) => {
            info!("final angles: {params:?}");
            Ok(())
        }
        Err(e) => {
            error!("training failed: {e:#}");
            Err(e)
        }
    }
}
