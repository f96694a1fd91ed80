use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

#[cfg(feature = "metrics")]
use quietrelay_metrics::{counter, media as media_metrics};

use crate::{
    error::{Error, Result},
    image_ops,
    scratch::{self, ScratchFile, ScratchOrigin},
};

/// Produce a metadata-free copy of `file` next to it (`<path>_cleaned`).
///
/// Strippable images are decoded and re-encoded; everything else is copied
/// byte-for-byte. This never fails: on any error the partial output is removed
/// and the original file is returned unchanged, so a broken image is shipped
/// as-is rather than dropping the post.
pub async fn strip(file: &ScratchFile) -> ScratchFile {
    let src = file.path.clone();
    let dst = cleaned_path(&src);

    let task_dst = dst.clone();
    let result = tokio::task::spawn_blocking(move || strip_blocking(&src, &task_dst))
        .await
        .map_err(|e| Error::external("metadata strip task failed", e))
        .and_then(|r| r);

    match result {
        Ok(cleaned) => cleaned,
        Err(e) => {
            warn!(
                path = %file.path.display(),
                error = %e,
                "metadata cleaning failed, sending original file"
            );
            scratch::remove_files([dst.as_path()]);
            file.clone()
        },
    }
}

fn cleaned_path(src: &Path) -> PathBuf {
    let mut name = src.as_os_str().to_owned();
    name.push("_cleaned");
    PathBuf::from(name)
}

fn strip_blocking(src: &Path, dst: &Path) -> Result<ScratchFile> {
    let data = std::fs::read(src)?;

    let size = match image_ops::strip_metadata(&data)? {
        Some(clean) => {
            let before = image_ops::metadata_len(&data);
            let after = image_ops::metadata_len(&clean);
            std::fs::write(dst, &clean)?;
            debug!(
                path = %src.display(),
                metadata_before = before,
                metadata_after = after,
                original_bytes = data.len(),
                cleaned_bytes = clean.len(),
                "re-encoded image without metadata"
            );
            #[cfg(feature = "metrics")]
            counter!(media_metrics::METADATA_BYTES_STRIPPED_TOTAL)
                .increment(before.saturating_sub(after) as u64);
            info!(path = %src.display(), "metadata cleaned from image");
            clean.len() as u64
        },
        None => {
            std::fs::write(dst, &data)?;
            info!(path = %src.display(), "file copied without metadata cleaning");
            data.len() as u64
        },
    };

    Ok(ScratchFile {
        path: dst.to_path_buf(),
        size,
        origin: ScratchOrigin::Stripped,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::image_ops::tests::{jpeg_with_exif, png_with_metadata},
        image::DynamicImage,
        std::fs,
    };

    fn fetched(path: PathBuf) -> ScratchFile {
        let size = fs::metadata(&path).unwrap().len();
        ScratchFile {
            path,
            size,
            origin: ScratchOrigin::Fetched,
        }
    }

    #[tokio::test]
    async fn image_is_rewritten_without_exif() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("abc_photo");
        fs::write(&raw, jpeg_with_exif(32, 24)).unwrap();
        let input = fetched(raw.clone());

        let out = strip(&input).await;
        assert_eq!(out.origin, ScratchOrigin::Stripped);
        assert_eq!(out.path, tmp.path().join("abc_photo_cleaned"));

        let bytes = fs::read(&out.path).unwrap();
        assert_eq!(out.size, bytes.len() as u64);
        assert_eq!(image_ops::metadata_len(&bytes), 0);
        // The original stays on disk for the caller to clean up.
        assert!(raw.exists());
    }

    #[tokio::test]
    async fn png_pixels_survive() {
        let tmp = tempfile::tempdir().unwrap();
        let source = DynamicImage::ImageRgb8(image_ops::tests::gradient_rgb(10, 10));
        let raw = tmp.path().join("p_document");
        fs::write(&raw, png_with_metadata(&source)).unwrap();

        let out = strip(&fetched(raw)).await;
        let decoded = image::load_from_memory(&fs::read(&out.path).unwrap()).unwrap();
        assert_eq!(decoded.to_rgb8().into_raw(), source.to_rgb8().into_raw());
        assert_eq!(image_ops::metadata_len(&fs::read(&out.path).unwrap()), 0);
    }

    #[tokio::test]
    async fn non_image_is_copied_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("v_video");
        let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        fs::write(&raw, &payload).unwrap();

        let out = strip(&fetched(raw)).await;
        assert_eq!(out.origin, ScratchOrigin::Stripped);
        assert_eq!(fs::read(&out.path).unwrap(), payload);
    }

    #[tokio::test]
    async fn broken_image_falls_back_to_original() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("x_photo");
        let mut bogus = b"\x89PNG\r\n\x1a\n".to_vec();
        bogus.extend_from_slice(&[0u8; 64]);
        fs::write(&raw, &bogus).unwrap();
        let input = fetched(raw);

        let out = strip(&input).await;
        assert_eq!(out, input);
        assert!(!cleaned_path(&input.path).exists());
    }

    #[tokio::test]
    async fn missing_source_falls_back_to_original() {
        let tmp = tempfile::tempdir().unwrap();
        let input = ScratchFile {
            path: tmp.path().join("vanished"),
            size: 10,
            origin: ScratchOrigin::Fetched,
        };
        assert_eq!(strip(&input).await, input);
    }
}
