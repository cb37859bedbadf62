//! QR code display of the current token
//!
//! Renders the token URL as a PNG so a display next to the door can show a
//! scannable code. The image is replaced atomically on every rotation.

use std::path::PathBuf;

use qrcode::{EcLevel, QrCode};
use tracing::info;

use doorlock_core::{Error, NotificationSink};

use crate::error::{DaemonError, Result};

/// Writes the token URL as a QR code image
pub struct QrCodeSink {
    path: PathBuf,
    size: u32,
}

impl QrCodeSink {
    pub fn new(path: PathBuf, size: u32) -> Self {
        Self { path, size }
    }

    fn write_png(&self, url: &str) -> Result<()> {
        let png = to_png(url, self.size)?;

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| DaemonError::Config(format!("{:?} is not a file path", self.path)))?;
        let mut temp_name = file_name.to_os_string();
        temp_name.push(".tmp");
        let temp_path = self.path.with_file_name(temp_name);

        std::fs::write(&temp_path, &png)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl NotificationSink for QrCodeSink {
    fn publish(&self, token_hex: &str, url: &str) -> doorlock_core::Result<()> {
        self.write_png(url)
            .map_err(|e| Error::Notification(e.to_string()))?;
        info!(token = %token_hex, "QR code for {} written to {:?}", url, self.path);
        Ok(())
    }
}

/// Render data as a PNG QR code with medium error correction
pub fn to_png(data: &str, size: u32) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(data, EcLevel::M)
        .map_err(|e| DaemonError::Qr(format!("QR encode: {}", e)))?;

    let image = code
        .render::<image::Luma<u8>>()
        .min_dimensions(size, size)
        .build();

    let mut png_bytes = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut png_bytes);

    image::DynamicImage::ImageLuma8(image)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|e| DaemonError::Qr(format!("PNG encode: {}", e)))?;

    Ok(png_bytes)
}
