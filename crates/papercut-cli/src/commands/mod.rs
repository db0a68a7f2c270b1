pub mod config;
pub mod crop;
pub mod segment;

use papercut_core::config::{load_config, SegmentConfig};
use papercut_core::error::PapercutError;
use std::path::Path;

fn load_settings(path: Option<&Path>) -> Result<SegmentConfig, PapercutError> {
    match path {
        Some(p) => load_config(p),
        None => Ok(SegmentConfig::default()),
    }
}
