use {
    base64::Engine,
    chatrelay_protocol::{ReplyKind, ReplyRequest},
    image::{DynamicImage, ImageFormat},
    std::{io::Cursor, path::PathBuf},
};

use crate::error::{Error, Result};

/// A reply waiting in a dispatcher queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: ReplyKind,
    /// Reply text, or base64-encoded PNG bytes for images.
    pub payload: String,
    pub room: String,
}

impl OutboundMessage {
    pub fn text(room: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Text,
            payload: text.into(),
            room: room.into(),
        }
    }

    /// Build an image reply, re-encoding the source as base64 PNG.
    pub fn image(room: impl Into<String>, source: ImageSource) -> Result<Self> {
        Ok(Self {
            kind: ReplyKind::Image,
            payload: encode_png_base64(source)?,
            room: room.into(),
        })
    }

    pub fn as_request(&self) -> ReplyRequest<'_> {
        ReplyRequest {
            kind: self.kind,
            room: &self.room,
            data: &self.payload,
        }
    }
}

/// Where an image reply comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded image bytes in any format the `image` crate can decode.
    Bytes(Vec<u8>),
    /// Path to an image file.
    File(PathBuf),
    /// An already decoded image.
    Decoded(DynamicImage),
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<DynamicImage> for ImageSource {
    fn from(image: DynamicImage) -> Self {
        Self::Decoded(image)
    }
}

/// Decode `source` and return its PNG encoding as standard base64.
pub fn encode_png_base64(source: ImageSource) -> Result<String> {
    let image = match source {
        ImageSource::Decoded(image) => image,
        ImageSource::Bytes(bytes) => image::load_from_memory(&bytes)
            .map_err(|e| Error::encoding("failed to decode image bytes", e))?,
        ImageSource::File(path) => {
            let bytes = std::fs::read(&path)
                .map_err(|e| Error::encoding(format!("failed to read {}", path.display()), e))?;
            image::load_from_memory(&bytes).map_err(|e| {
                Error::encoding(format!("failed to decode {}", path.display()), e)
            })?
        },
    };

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::encoding("failed to encode PNG", e))?;

    Ok(base64::engine::general_purpose::STANDARD.encode(&png))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use {super::*, image::RgbaImage};

    pub(crate) fn tiny_png() -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255])));
        let mut out = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn png_bytes_round_trip_through_base64() {
        let encoded = encode_png_base64(ImageSource::Bytes(tiny_png())).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let image = image::load_from_memory(&decoded).unwrap();
        assert_eq!((image.width(), image.height()), (2, 2));
    }

    #[test]
    fn corrupt_bytes_are_an_encoding_error() {
        let err = encode_png_base64(ImageSource::Bytes(b"definitely not an image".to_vec()))
            .unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
    }

    #[test]
    fn missing_file_is_an_encoding_error() {
        let err = encode_png_base64(ImageSource::File("/nonexistent/reply.png".into())).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
        assert!(err.to_string().contains("/nonexistent/reply.png"));
    }

    #[test]
    fn text_message_carries_room() {
        let msg = OutboundMessage::text("room-1", "hello");
        let body = serde_json::to_value(msg.as_request()).unwrap();
        assert_eq!(body, serde_json::json!({"type": "text", "room": "room-1", "data": "hello"}));
    }
}
