//! Image re-encoding without metadata.
//!
//! Decoding into a pixel buffer and encoding it again is enough to drop every
//! auxiliary block (EXIF, GPS, XMP, IPTC, text chunks): the `image` encoders
//! never write them unless asked to.

use std::io::Cursor;

use image::{ImageFormat, ImageReader, codecs::jpeg::JpegEncoder};

use crate::error::Result;

/// JPEG quality used when re-encoding (0-100).
pub const STRIP_JPEG_QUALITY: u8 = 95;

/// Container formats the stripper re-encodes. Anything else is passed
/// through byte-for-byte.
pub const STRIPPABLE_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Tiff,
    ImageFormat::Bmp,
    ImageFormat::WebP,
];

/// Sniff the container format from the content and return it when strippable.
#[must_use]
pub fn strippable_format(data: &[u8]) -> Option<ImageFormat> {
    image::guess_format(data)
        .ok()
        .filter(|f| STRIPPABLE_FORMATS.contains(f))
}

/// Re-encode `data` without metadata.
///
/// Returns `Ok(None)` when the content is not a strippable image. The output
/// keeps the input's format and dimensions; only JPEG is lossy.
pub fn strip_metadata(data: &[u8]) -> Result<Option<Vec<u8>>> {
    let Some(format) = strippable_format(data) else {
        return Ok(None);
    };

    let img = ImageReader::with_format(Cursor::new(data), format).decode()?;

    let mut output = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut output, STRIP_JPEG_QUALITY);
            img.write_with_encoder(encoder)?;
        },
        other => img.write_to(&mut output, other)?,
    }

    Ok(Some(output.into_inner()))
}

/// Total bytes of identifying metadata blocks in a JPEG or PNG.
///
/// Counts JPEG APP1 (EXIF/XMP), APP13 (IPTC) and COM segments, and PNG
/// `eXIf`, `tEXt`, `iTXt` and `zTXt` chunks. Other formats report 0.
#[must_use]
pub fn metadata_len(data: &[u8]) -> usize {
    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => jpeg_metadata_len(data),
        Ok(ImageFormat::Png) => png_metadata_len(data),
        _ => 0,
    }
}

fn jpeg_metadata_len(data: &[u8]) -> usize {
    let mut total = 0usize;
    let mut i = 2; // skip SOI

    while i + 1 < data.len() {
        if data[i] != 0xFF {
            break;
        }
        let marker = data[i + 1];
        match marker {
            // Fill byte before a marker.
            0xFF => {
                i += 1;
                continue;
            },
            // Start of scan or end of image: no more headers.
            0xDA | 0xD9 => break,
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            },
            _ => {},
        }
        let Some(len_bytes) = data.get(i + 2..i + 4) else {
            break;
        };
        let seg_len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
        if matches!(marker, 0xE1 | 0xED | 0xFE) {
            total += seg_len + 2;
        }
        i += 2 + seg_len;
    }

    total
}

fn png_metadata_len(data: &[u8]) -> usize {
    let mut total = 0usize;
    let mut i = 8; // skip signature

    while let Some(header) = data.get(i..i + 8) {
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = &header[4..8];
        if matches!(kind, b"eXIf" | b"tEXt" | b"iTXt" | b"zTXt") {
            total += len + 12;
        }
        if kind == b"IEND" {
            break;
        }
        i += len + 12;
    }

    total
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod tests {
    use {
        super::*,
        image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage},
    };

    /// Minimal little-endian TIFF header with an empty IFD, wrapped as EXIF.
    const EXIF_PAYLOAD: &[u8] = b"Exif\0\0II*\0\x08\0\0\0\0\0\0\0\0\0";

    pub(crate) fn gradient_rgb(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8])
        })
    }

    pub(crate) fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    /// JPEG with an APP1 EXIF segment spliced in right after SOI.
    pub(crate) fn jpeg_with_exif(width: u32, height: u32) -> Vec<u8> {
        let plain = encode(
            &DynamicImage::ImageRgb8(gradient_rgb(width, height)),
            ImageFormat::Jpeg,
        );
        let seg_len = (EXIF_PAYLOAD.len() + 2) as u16;
        let mut out = Vec::with_capacity(plain.len() + EXIF_PAYLOAD.len() + 4);
        out.extend_from_slice(&plain[..2]);
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&seg_len.to_be_bytes());
        out.extend_from_slice(EXIF_PAYLOAD);
        out.extend_from_slice(&plain[2..]);
        out
    }

    /// PNG with `eXIf` and `tEXt` chunks inserted after IHDR.
    pub(crate) fn png_with_metadata(img: &DynamicImage) -> Vec<u8> {
        let plain = encode(img, ImageFormat::Png);
        // Signature (8) + IHDR chunk (4 len + 4 type + 13 data + 4 crc).
        let ihdr_end = 8 + 25;
        let mut out = plain[..ihdr_end].to_vec();
        for (kind, body) in [
            (b"eXIf", &EXIF_PAYLOAD[6..]),
            (b"tEXt", &b"Author\0Somebody Private"[..]),
        ] {
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            let mut typed = kind.to_vec();
            typed.extend_from_slice(body);
            out.extend_from_slice(&typed);
            out.extend_from_slice(&crc32fast::hash(&typed).to_be_bytes());
        }
        out.extend_from_slice(&plain[ihdr_end..]);
        out
    }

    #[test]
    fn detects_strippable_formats() {
        let jpeg = jpeg_with_exif(4, 4);
        assert_eq!(strippable_format(&jpeg), Some(ImageFormat::Jpeg));
        assert_eq!(strippable_format(b"\x1aE\xdf\xa3 matroska"), None);
        assert_eq!(strippable_format(b"%PDF-1.7"), None);
        assert_eq!(strippable_format(&[]), None);
    }

    #[test]
    fn jpeg_exif_is_measured() {
        let jpeg = jpeg_with_exif(4, 4);
        assert_eq!(metadata_len(&jpeg), EXIF_PAYLOAD.len() + 4);
    }

    #[test]
    fn jpeg_strip_drops_exif_and_keeps_dimensions() {
        let jpeg = jpeg_with_exif(16, 12);
        assert!(metadata_len(&jpeg) > 0);

        let stripped = strip_metadata(&jpeg).unwrap().expect("jpeg is strippable");
        assert_eq!(metadata_len(&stripped), 0);
        assert!(!stripped.windows(6).any(|w| w == b"Exif\0\0"));

        let img = image::load_from_memory(&stripped).unwrap();
        assert_eq!(img.dimensions(), (16, 12));
        assert_eq!(image::guess_format(&stripped).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn png_strip_preserves_pixels_exactly() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_fn(9, 7, |x, y| {
            Rgba([(x * 20) as u8, (y * 30) as u8, 200, ((x + y) * 10) as u8])
        }));
        let png = png_with_metadata(&source);
        assert!(metadata_len(&png) > 0);

        let stripped = strip_metadata(&png).unwrap().expect("png is strippable");
        assert_eq!(metadata_len(&stripped), 0);

        let before = image::load_from_memory(&png).unwrap();
        let after = image::load_from_memory(&stripped).unwrap();
        assert_eq!(before.dimensions(), after.dimensions());
        assert_eq!(before.to_rgba8().into_raw(), after.to_rgba8().into_raw());
    }

    #[test]
    fn bmp_strip_preserves_pixels() {
        let source = DynamicImage::ImageRgb8(gradient_rgb(5, 3));
        let bmp = encode(&source, ImageFormat::Bmp);
        let stripped = strip_metadata(&bmp).unwrap().expect("bmp is strippable");
        let after = image::load_from_memory(&stripped).unwrap();
        assert_eq!(after.to_rgb8().into_raw(), source.to_rgb8().into_raw());
    }

    #[test]
    fn tiff_and_webp_strip_preserve_pixels() {
        let source = DynamicImage::ImageRgb8(gradient_rgb(6, 4));
        for format in [ImageFormat::Tiff, ImageFormat::WebP] {
            let encoded = encode(&source, format);
            assert_eq!(strippable_format(&encoded), Some(format));

            let stripped = strip_metadata(&encoded)
                .unwrap()
                .unwrap_or_else(|| panic!("{format:?} is strippable"));
            assert_eq!(image::guess_format(&stripped).unwrap(), format);

            let after = image::load_from_memory(&stripped).unwrap();
            assert_eq!(after.dimensions(), (6, 4), "{format:?}");
            assert_eq!(
                after.to_rgb8().into_raw(),
                source.to_rgb8().into_raw(),
                "{format:?}"
            );
        }
    }

    #[test]
    fn non_image_is_not_touched() {
        assert!(strip_metadata(b"ID3\x04\0\0\0\0\0\0 audio").unwrap().is_none());
        assert_eq!(metadata_len(b"plain text"), 0);
    }

    #[test]
    fn corrupt_image_is_an_error() {
        let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
        png.extend_from_slice(b"definitely not an IHDR chunk");
        assert_eq!(strippable_format(&png), Some(ImageFormat::Png));
        assert!(strip_metadata(&png).is_err());
    }
}
