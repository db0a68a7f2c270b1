use papercut_core::config::SegmentConfig;
use papercut_core::error::PapercutError;

pub fn print_defaults() -> Result<(), PapercutError> {
    let json = serde_json::to_string_pretty(&SegmentConfig::default())?;
    println!("{json}");
    Ok(())
}
