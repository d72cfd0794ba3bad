//! Input file validation for images and videos.

use anyhow::{anyhow, Context, Result};
use image::ImageFormat;
use std::path::Path;

pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;
pub const MAX_VIDEO_BYTES: u64 = 50 * 1024 * 1024;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mjpeg", "mjpg"];

/// A validated image ready to be posted to `/predict`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("{} is not a file", path.display()))?;
        check_extension(&file_name, IMAGE_EXTENSIONS)?;
        let size = std::fs::metadata(path)
            .with_context(|| format!("read {}", path.display()))?
            .len();
        if size > MAX_IMAGE_BYTES as u64 {
            return Err(too_large(&file_name, MAX_IMAGE_BYTES as u64));
        }
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_bytes(file_name, bytes)
    }

    /// Validate in-memory bytes: extension, size, and that the content really
    /// is one of the accepted image formats.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        check_extension(&file_name, IMAGE_EXTENSIONS)?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(too_large(&file_name, MAX_IMAGE_BYTES as u64));
        }
        let format = image::guess_format(&bytes)
            .map_err(|_| anyhow!("{} is not an image", file_name))?;
        let content_type = match format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
            other => {
                return Err(anyhow!(
                    "{} is a {:?} image; use PNG, JPG or WEBP",
                    file_name,
                    other
                ))
            }
        };
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }
}

/// Check that a video path has a supported container and size.
pub fn validate_video(path: &Path) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("{} is not a file", path.display()))?;
    check_extension(&file_name, VIDEO_EXTENSIONS)?;
    let size = std::fs::metadata(path)
        .with_context(|| format!("read {}", path.display()))?
        .len();
    if size > MAX_VIDEO_BYTES {
        return Err(too_large(&file_name, MAX_VIDEO_BYTES));
    }
    Ok(())
}

fn check_extension(file_name: &str, allowed: &[&str]) -> Result<()> {
    let ext = Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if allowed.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(anyhow!(
            "unsupported file type for {}; expected one of: {}",
            file_name,
            allowed.join(", ")
        ))
    }
}

fn too_large(file_name: &str, limit: u64) -> anyhow::Error {
    anyhow!(
        "{} is larger than the {} MB limit",
        file_name,
        limit / (1024 * 1024)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, Rgb([10, 200, 10]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn accepts_png() {
        let upload = ImageUpload::from_bytes("field.PNG", png_bytes()).unwrap();
        assert_eq!(upload.content_type, "image/png");
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = ImageUpload::from_bytes("notes.txt", png_bytes()).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn rejects_non_image_content() {
        let err = ImageUpload::from_bytes("field.jpg", b"hello".to_vec()).unwrap_err();
        assert!(err.to_string().contains("not an image"));
    }

    #[test]
    fn rejects_oversized_image() {
        let mut bytes = png_bytes();
        bytes.resize(MAX_IMAGE_BYTES + 1, 0);
        assert!(ImageUpload::from_bytes("big.png", bytes).is_err());
    }

    #[test]
    fn video_extension_is_checked() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let good = dir.path().join("walk.mjpeg");
        std::fs::write(&good, b"")?;
        validate_video(&good)?;

        let bad = dir.path().join("walk.mp4");
        std::fs::write(&bad, b"")?;
        assert!(validate_video(&bad).is_err());
        Ok(())
    }
}
