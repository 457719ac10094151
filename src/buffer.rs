//! Raw decoded image representation and the codec operations around it
//!
//! Every preprocessing stage consumes one [`PixelBuffer`] and produces a new
//! one. Decoding, encoding, rotation and resampling are delegated to the
//! `image` and `imageproc` crates.

use crate::error::OcrError;
use image::{
    imageops::FilterType, DynamicImage, GrayImage, GrayAlphaImage, ImageFormat, Luma, LumaA,
    Rgb, RgbImage, Rgba, RgbaImage,
};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use std::io::Cursor;

/// Row-major, channel-interleaved 8-bit image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Create a buffer, checking `pixels.len() == width * height * channels`
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Result<Self, OcrError> {
        if channels == 0 || channels > 4 {
            return Err(OcrError::ProcessingError(format!(
                "Unsupported channel count: {}",
                channels
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(OcrError::ProcessingError(format!(
                "Pixel buffer length {} does not match {}x{}x{} ({})",
                pixels.len(),
                width,
                height,
                channels,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// Single-channel buffer filled with one value
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            channels: 1,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    /// Single-channel buffer computed per pixel
    pub fn from_fn_gray<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> u8,
    {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            channels: 1,
            pixels,
        }
    }

    pub fn from_gray(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            channels: 1,
            pixels: image.into_raw(),
        }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        let (channels, pixels) = match image {
            DynamicImage::ImageLuma8(img) => (1, img.into_raw()),
            DynamicImage::ImageLumaA8(img) => (2, img.into_raw()),
            DynamicImage::ImageRgb8(img) => (3, img.into_raw()),
            DynamicImage::ImageRgba8(img) => (4, img.into_raw()),
            other => (4, other.into_rgba8().into_raw()),
        };
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// First-channel value at (x, y)
    #[inline]
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        self.pixels[idx]
    }

    /// New buffer with the same shape whose every channel holds `f(x, y)`
    pub fn map_replicated<F>(&self, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> u8,
    {
        let channels = self.channels as usize;
        let mut pixels = Vec::with_capacity(self.pixels.len());
        for y in 0..self.height {
            for x in 0..self.width {
                let value = f(x, y);
                pixels.extend(std::iter::repeat(value).take(channels));
            }
        }
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            pixels,
        }
    }

    /// First channel as a grayscale image
    pub fn to_gray(&self) -> GrayImage {
        if self.channels == 1 {
            if let Some(image) = GrayImage::from_raw(self.width, self.height, self.pixels.clone())
            {
                return image;
            }
        }
        GrayImage::from_fn(self.width, self.height, |x, y| Luma([self.luma(x, y)]))
    }

    pub fn to_dynamic(&self) -> Result<DynamicImage, OcrError> {
        let (w, h) = (self.width, self.height);
        let data = self.pixels.clone();
        let invalid = || OcrError::ProcessingError("Pixel buffer does not fit image".to_string());
        let image = match self.channels {
            1 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, data).ok_or_else(invalid)?),
            2 => DynamicImage::ImageLumaA8(
                GrayAlphaImage::from_raw(w, h, data).ok_or_else(invalid)?,
            ),
            3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, data).ok_or_else(invalid)?),
            _ => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, data).ok_or_else(invalid)?),
        };
        Ok(image)
    }
}

/// Decode any format the `image` crate understands
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, OcrError> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| OcrError::DecodeError(format!("Failed to load image: {}", e)))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(OcrError::DecodeError("Image has no pixels".to_string()));
    }
    Ok(PixelBuffer::from_dynamic(image))
}

pub fn encode(buffer: &PixelBuffer, format: ImageFormat) -> Result<Vec<u8>, OcrError> {
    let image = buffer.to_dynamic()?;
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to encode image: {}", e)))?;
    Ok(bytes)
}

/// Rotate clockwise about the center by `degrees`, filling uncovered area with `background`
pub fn rotate(buffer: &PixelBuffer, degrees: f32, background: u8) -> Result<PixelBuffer, OcrError> {
    let theta = degrees.to_radians();
    let interpolation = Interpolation::Bilinear;
    let rotated = match buffer.to_dynamic()? {
        DynamicImage::ImageLuma8(img) => DynamicImage::ImageLuma8(rotate_about_center(
            &img,
            theta,
            interpolation,
            Luma([background]),
        )),
        DynamicImage::ImageLumaA8(img) => DynamicImage::ImageLumaA8(rotate_about_center(
            &img,
            theta,
            interpolation,
            LumaA([background, 255]),
        )),
        DynamicImage::ImageRgb8(img) => DynamicImage::ImageRgb8(rotate_about_center(
            &img,
            theta,
            interpolation,
            Rgb([background; 3]),
        )),
        other => DynamicImage::ImageRgba8(rotate_about_center(
            &other.into_rgba8(),
            theta,
            interpolation,
            Rgba([background, background, background, 255]),
        )),
    };
    Ok(PixelBuffer::from_dynamic(rotated))
}

pub fn resize(
    buffer: &PixelBuffer,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<PixelBuffer, OcrError> {
    if width == 0 || height == 0 {
        return Err(OcrError::ProcessingError(format!(
            "Cannot resize to {}x{}",
            width, height
        )));
    }
    let resized = buffer.to_dynamic()?.resize_exact(width, height, filter);
    Ok(PixelBuffer::from_dynamic(resized))
}
