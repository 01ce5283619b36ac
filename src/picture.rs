//! Embedded image extraction.
//!
//! RTF embeds pictures as `{\pict ...}` groups whose payload is hex-encoded
//! (or raw via `\binN`). The format is declared by a blip control word;
//! when it is missing the payload's magic bytes decide.

/// Image payload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    Png,
    Jpeg,
    /// Windows Metafile
    Wmf,
    /// Enhanced Metafile
    Emf,
    /// Device-independent or device-dependent bitmap
    Bmp,
    /// Unknown or unsupported format
    #[default]
    Other,
}

/// An image extracted from a picture group.
///
/// Dimensions are in twips as declared; zero means undeclared. The payload
/// is arena-owned and already decoded from its hex or binary encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Image<'a> {
    pub format: ImageFormat,
    /// Width in twips, 0 = undeclared
    pub width: i32,
    /// Height in twips, 0 = undeclared
    pub height: i32,
    /// Bits per pixel for bitmap formats, 0 = undeclared
    pub bits_per_pixel: i32,
    /// Desired display width in twips, 0 = undeclared
    pub goal_width: i32,
    /// Desired display height in twips, 0 = undeclared
    pub goal_height: i32,
    /// Horizontal scaling percentage, 0 = undeclared
    pub scale_x: i32,
    /// Vertical scaling percentage, 0 = undeclared
    pub scale_y: i32,
    /// Decoded payload bytes
    pub data: &'a [u8],
}

impl<'a> Image<'a> {
    /// The effective width in twips, preferring the goal width and
    /// applying scaling.
    #[inline]
    pub fn computed_width(&self) -> i32 {
        let base = if self.goal_width > 0 {
            self.goal_width
        } else {
            self.width
        };
        if self.scale_x > 0 {
            base * self.scale_x / 100
        } else {
            base
        }
    }

    /// The effective height in twips, preferring the goal height and
    /// applying scaling.
    #[inline]
    pub fn computed_height(&self) -> i32 {
        let base = if self.goal_height > 0 {
            self.goal_height
        } else {
            self.height
        };
        if self.scale_y > 0 {
            base * self.scale_y / 100
        } else {
            base
        }
    }

    /// Effective width in pixels at the given DPI.
    #[inline]
    pub fn width_pixels(&self, dpi: u32) -> u32 {
        (self.computed_width().max(0) as u32).saturating_mul(dpi) / 1440
    }

    /// Effective height in pixels at the given DPI.
    #[inline]
    pub fn height_pixels(&self, dpi: u32) -> u32 {
        (self.computed_height().max(0) as u32).saturating_mul(dpi) / 1440
    }
}

/// Detect an image format from its leading magic bytes.
pub fn detect_format(data: &[u8]) -> ImageFormat {
    // JPEG: FF D8
    if data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8 {
        return ImageFormat::Jpeg;
    }

    // PNG: eight-byte signature
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return ImageFormat::Png;
    }

    // EMF: record type 1 with " EMF" marker at offset 40
    if data.len() >= 44 && data[0..4] == [0x01, 0x00, 0x00, 0x00] && &data[40..44] == b" EMF" {
        return ImageFormat::Emf;
    }

    // Aldus placeable WMF
    if data.starts_with(&[0xD7, 0xCD, 0xC6, 0x9A]) {
        return ImageFormat::Wmf;
    }

    // "BM" bitmap
    if data.starts_with(b"BM") {
        return ImageFormat::Bmp;
    }

    ImageFormat::Other
}
