// Image loading module
// Decodes candidate files and prepares frames for the display

use crate::fit::{fit_image, DisplayBounds};
use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a candidate could not be turned into an image
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Not a recognizable image, corrupt data, or an unsupported format
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// A freshly decoded candidate, owned by a single loop iteration
#[derive(Debug)]
pub struct DecodedImage {
    pub info: ImageInfo,
    pub image: DynamicImage,
}

/// Metadata printed for every previewed image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// File name without extension
    pub name: String,
    pub extension: String,
    pub path: PathBuf,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel of the decoded color type
    pub bytes_per_pixel: u8,
    /// Size of the file on disk
    pub file_size: u64,
}

impl ImageInfo {
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Approximate in-memory size of the decoded raster
    pub fn memory_size(&self) -> u64 {
        self.pixel_count() * self.bytes_per_pixel as u64
    }

    pub fn dimensions(&self) -> String {
        format!("{} x {}", self.width, self.height)
    }
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name:       {}", self.name)?;
        writeln!(f, "Extension:  {}", self.extension)?;
        writeln!(f, "Format:     {:?}", self.format)?;
        writeln!(f, "Path:       {}", self.path.display())?;
        writeln!(f, "Width:      {}", self.width)?;
        writeln!(f, "Height:     {}", self.height)?;
        writeln!(f, "Dimensions: {}", self.dimensions())?;
        writeln!(f, "Pixels:     {}", self.pixel_count())?;
        writeln!(f, "Memory:     {} bytes", self.memory_size())?;
        write!(f, "File size:  {} bytes", self.file_size)
    }
}

/// Raster ready to be copied into a shared-memory buffer
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Pixels in B, G, R, A order (ARGB8888 little-endian)
    pub bgra_data: Vec<u8>,
}

impl Frame {
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();

        // Convert RGBA to BGRA (Wayland expects ARGB/BGRA in little-endian)
        let mut bgra_data = rgba.into_raw();
        for pixel in bgra_data.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }

        Self {
            width,
            height,
            bgra_data,
        }
    }
}

impl DecodedImage {
    /// Build the frame to show, downscaled to `bounds` when needed
    pub fn to_frame(&self, bounds: DisplayBounds) -> Frame {
        Frame::from_image(&fit_image(&self.image, bounds))
    }
}

/// Read and decode the file at `path`
pub fn load_image(path: &Path) -> Result<DecodedImage, LoadError> {
    let data = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let (format, image) = load_from_bytes(&data).map_err(|source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    let info = ImageInfo {
        name: file_stem(path),
        extension: path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.to_path_buf(),
        format,
        width: image.width(),
        height: image.height(),
        bytes_per_pixel: image.color().bytes_per_pixel(),
        file_size: data.len() as u64,
    };

    Ok(DecodedImage { info, image })
}

/// Load an image from raw bytes, auto-detecting the format from its contents
fn load_from_bytes(data: &[u8]) -> Result<(ImageFormat, DynamicImage), image::ImageError> {
    let format = image::guess_format(data)?;
    let image = image::load(Cursor::new(data), format)?;
    Ok((format, image))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn decodes_png_with_metadata() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sunset.png");
        RgbImage::from_pixel(12, 7, Rgb([10, 20, 30])).save(&path).unwrap();

        let decoded = load_image(&path).unwrap();
        let info = &decoded.info;
        assert_eq!(info.name, "sunset");
        assert_eq!(info.extension, "png");
        assert_eq!(info.format, ImageFormat::Png);
        assert_eq!((info.width, info.height), (12, 7));
        assert_eq!(info.dimensions(), "12 x 7");
        assert_eq!(info.pixel_count(), 84);
        assert_eq!(info.memory_size(), 84 * 3);
        assert_eq!(info.file_size, fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn memory_size_follows_color_type() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gray.png");
        GrayImage::from_pixel(5, 5, Luma([9])).save(&path).unwrap();

        let decoded = load_image(&path).unwrap();
        assert_eq!(decoded.info.bytes_per_pixel, 1);
        assert_eq!(decoded.info.memory_size(), 25);
    }

    #[test]
    fn format_comes_from_contents_not_extension() {
        let tmp = TempDir::new().unwrap();
        let png = tmp.path().join("real.png");
        RgbImage::new(3, 3).save(&png).unwrap();
        let disguised = tmp.path().join("photo.dat");
        fs::copy(&png, &disguised).unwrap();

        let decoded = load_image(&disguised).unwrap();
        assert_eq!(decoded.info.format, ImageFormat::Png);
        assert_eq!(decoded.info.extension, "dat");
    }

    #[test]
    fn text_file_fails_to_decode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        fs::write(&path, "definitely not pixels").unwrap();

        assert!(matches!(load_image(&path), Err(LoadError::Decode { .. })));
    }

    #[test]
    fn truncated_image_fails_to_decode() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        RgbImage::new(64, 64).save(&path).unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        assert!(load_image(&path).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_image(&tmp.path().join("gone.png")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn frame_is_bgra() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 1, Rgba([1, 2, 3, 4])));
        let frame = Frame::from_image(&img);
        assert_eq!((frame.width, frame.height), (2, 1));
        assert_eq!(frame.bgra_data, vec![3, 2, 1, 4, 3, 2, 1, 4]);
    }

    #[test]
    fn frame_respects_bounds() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.png");
        RgbImage::new(300, 150).save(&path).unwrap();

        let decoded = load_image(&path).unwrap();
        let frame = decoded.to_frame(DisplayBounds::new(100, 100));
        assert_eq!((frame.width, frame.height), (100, 50));
        assert_eq!(frame.bgra_data.len(), 100 * 50 * 4);

        let native = decoded.to_frame(DisplayBounds::default());
        assert_eq!((native.width, native.height), (300, 150));
    }
}
