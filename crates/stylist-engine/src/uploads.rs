use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use image::ImageFormat;
use stylist_contracts::closet::{UploadBatch, UploadedFile};

/// Reads one clothing photo or selfie from disk.
///
/// Only `png`, `jpg` and `jpeg` files are accepted, and the bytes must
/// actually be in the format the extension claims.
pub fn load_upload(path: &Path) -> Result<UploadedFile> {
    let Some(subtype) = mime_subtype_for_path(path) else {
        bail!(
            "unsupported upload {} (expected png, jpg or jpeg)",
            path.display()
        );
    };
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let detected = image::guess_format(&bytes)
        .with_context(|| format!("{} is not a readable image", path.display()))?;
    let expected = match subtype {
        "png" => ImageFormat::Png,
        _ => ImageFormat::Jpeg,
    };
    if detected != expected {
        bail!(
            "{} looks like {:?}, not {}",
            path.display(),
            detected,
            subtype
        );
    }
    let filename = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadedFile::new(filename, bytes, subtype))
}

pub fn load_batch<P: AsRef<Path>>(paths: &[P]) -> Result<UploadBatch> {
    let files = paths
        .iter()
        .map(|path| load_upload(path.as_ref()))
        .collect::<Result<Vec<UploadedFile>>>()?;
    Ok(UploadBatch::new(files))
}

fn mime_subtype_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("png"),
        "jpg" | "jpeg" => Some("jpeg"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::{load_batch, load_upload};

    fn write_image(path: &std::path::Path) -> anyhow::Result<()> {
        let mut image = RgbImage::new(4, 4);
        for pixel in image.pixels_mut() {
            *pixel = Rgb([20, 40, 200]);
        }
        image.save(path)?;
        Ok(())
    }

    #[test]
    fn loads_png_and_jpeg_in_order() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let shirt = temp.path().join("shirt.jpg");
        let pants = temp.path().join("pants.png");
        write_image(&shirt)?;
        write_image(&pants)?;

        let batch = load_batch(&[&shirt, &pants])?;
        assert_eq!(batch.filenames(), vec!["shirt.jpg", "pants.png"]);
        assert_eq!(batch.files()[0].mime_subtype, "jpeg");
        assert_eq!(batch.files()[1].mime_type(), "image/png");
        Ok(())
    }

    #[test]
    fn rejects_other_extensions() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "hello")?;
        assert!(load_upload(&path).is_err());
        Ok(())
    }

    #[test]
    fn rejects_content_that_does_not_match_extension() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let real_png = temp.path().join("real.png");
        write_image(&real_png)?;
        let fake_jpg = temp.path().join("fake.jpg");
        std::fs::copy(&real_png, &fake_jpg)?;

        let err = load_upload(&fake_jpg)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("not jpeg"));
        Ok(())
    }
}
