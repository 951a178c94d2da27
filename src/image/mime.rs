/// Image container formats recognised from leading magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    /// Format named by the payload's magic bytes, if any.
    pub fn try_detect(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
            [0x89, 0x50, 0x4E, 0x47, ..] => Some(ImageFormat::Png),
            [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => {
                Some(ImageFormat::Webp)
            }
            [0x47, 0x49, 0x46, 0x38, ..] => Some(ImageFormat::Gif),
            _ => None,
        }
    }

    /// Sniff the payload for display; unknown payloads are treated as JPEG,
    /// which is what the inference API returns by default.
    pub fn detect(bytes: &[u8]) -> Self {
        Self::try_detect(bytes).unwrap_or_else(|| {
            tracing::warn!(
                "Unrecognized image format (first 4 bytes: {:02X?}), assuming image/jpeg",
                &bytes[..bytes.len().min(4)]
            );
            ImageFormat::Jpeg
        })
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Gif => "image/gif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Gif => "gif",
        }
    }
}
