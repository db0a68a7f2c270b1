use papercut_core::error::PapercutError;
use papercut_core::segment::SegmentationResult;

pub fn print(result: &SegmentationResult) -> Result<(), PapercutError> {
    let json = serde_json::to_string_pretty(result)?;
    println!("{json}");
    Ok(())
}
