//! Turns local paths into selected files. Directories are walked, plain files
//! are taken as given so validation can reject what is not an image.

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::registry::PhotoBlob;
use crate::utils::mime_type_for_path;

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "heic", "heif"];

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expands `inputs` into a list of files, keeping input order. Files inside
/// directories are sorted by path; hidden entries are skipped.
pub fn collect_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
            continue;
        }
        if !input.is_dir() {
            anyhow::bail!("Path not found: {}", input.display());
        }

        let mut found: Vec<PathBuf> = WalkBuilder::new(input)
            .hidden(true)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|e| e.file_type().map_or(false, |ft| ft.is_file()))
            .filter(|e| {
                // Hidden directories anywhere under the root are skipped too
                let relative = e.path().strip_prefix(input).unwrap_or(e.path());
                !relative
                    .components()
                    .any(|c| c.as_os_str().to_str().map_or(false, |name| name.starts_with('.')))
            })
            .map(|e| e.into_path())
            .filter(|p| has_image_extension(p))
            .collect();
        found.sort();

        tracing::debug!(dir = %input.display(), files = found.len(), "scanned directory");
        files.extend(found);
    }

    Ok(files)
}

fn load_blob(path: &Path, max_size: u64) -> Result<PhotoBlob> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::Error::msg("Invalid file name"))?;
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    if size > max_size {
        // Validation rejects it by size; the bytes are never needed.
        return Ok(PhotoBlob::unread(name, mime_type_for_path(path), size));
    }
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(PhotoBlob::new(name, mime_type_for_path(path), data))
}

/// Reads every file in parallel. Files larger than `max_size` keep their
/// size but are not read. Unreadable files are logged and skipped; the order
/// of the rest follows `paths`.
pub fn load_blobs(paths: &[PathBuf], max_size: u64) -> Vec<PhotoBlob> {
    paths
        .par_iter()
        .map(|path| (path, load_blob(path, max_size)))
        .collect::<Vec<_>>()
        .into_iter()
        .filter_map(|(path, result)| match result {
            Ok(blob) => Some(blob),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_FILE_SIZE;
    use crate::upload::{validate, Rejection};
    use std::fs;

    fn photo_dir() -> tempfile::TempDir {
        tempfile::Builder::new().prefix("photos").tempdir().unwrap()
    }

    #[test]
    fn directories_keep_only_visible_images() {
        let dir = photo_dir();
        fs::write(dir.path().join("b.JPG"), b"b").unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join(".hidden.jpg"), b"x").unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache").join("c.jpg"), b"x").unwrap();
        fs::create_dir(dir.path().join("trip")).unwrap();
        fs::write(dir.path().join("trip").join("d.webp"), b"d").unwrap();

        let found = collect_paths(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, ["a.png", "b.JPG", "trip/d.webp"]);
    }

    #[test]
    fn explicit_files_pass_through_unfiltered() {
        let dir = photo_dir();
        let text = dir.path().join("notes.txt");
        fs::write(&text, b"hello").unwrap();

        assert_eq!(collect_paths(&[text.clone()]).unwrap(), vec![text]);
        assert!(collect_paths(&[dir.path().join("missing.jpg")]).is_err());
    }

    #[test]
    fn blobs_carry_name_size_and_type() {
        let dir = photo_dir();
        let photo = dir.path().join("IMG_0001.jpg");
        fs::write(&photo, vec![0u8; 2048]).unwrap();
        let gone = dir.path().join("gone.png");

        let blobs = load_blobs(&[photo, gone], MAX_FILE_SIZE);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].name, "IMG_0001.jpg");
        assert_eq!(blobs[0].size, 2048);
        assert_eq!(blobs[0].mime_type, "image/jpeg");
    }

    #[test]
    fn oversized_files_are_not_read_but_still_rejected() {
        let dir = photo_dir();
        let big = dir.path().join("panorama.jpg");
        fs::write(&big, vec![0u8; 4096]).unwrap();

        let blobs = load_blobs(&[big], 1024);
        assert_eq!(blobs[0].size, 4096);
        assert!(blobs[0].data.is_empty());

        let (accepted, rejected) = validate(blobs, 1024);
        assert!(accepted.is_empty());
        assert!(matches!(&rejected[0], Rejection::TooLarge { name, size: 4096, .. } if name == "panorama.jpg"));
    }
}
