use std::error::Error;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageOutputFormat;

/// Models able to read image parts, in fallback order.
pub const VISION_MODELS: &[&str] = &["meta-llama/llama-4-scout-17b-16e-instruct"];

/// Completion budget used for image turns.
pub const VISION_MAX_COMPLETION_TOKENS: u32 = 1024;

/// Content recorded in history for a turn that only carried an image.
pub const IMAGE_PLACEHOLDER: &str = "*[image]*";

/// Normalizes arbitrary image bytes to PNG and returns the Base64 payload.
pub fn encode_png_base64(bytes: &[u8]) -> Result<String, Box<dyn Error>> {
    let image = image::load_from_memory(bytes)?;
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)?;
    Ok(STANDARD.encode(&buffer))
}

/// Reads an image file and returns it as a `data:image/png;base64,` URL.
pub fn image_data_url(path: &Path) -> Result<String, String> {
    let bytes = fs::read(path)
        .map_err(|err| format!("Failed to read image '{}': {err}", path.display()))?;
    let encoded = encode_png_base64(&bytes)
        .map_err(|err| format!("Failed to decode image '{}': {err}", path.display()))?;
    Ok(format!("data:image/png;base64,{encoded}"))
}
