//! Discovery of image and video assets on disk.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::db::{asset_repo, AssetRow, Database, DatabaseError};
use crate::error::ScanError;

/// Kind of media an asset holds, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// Classifies a path by MIME type. Returns `None` for anything that is not
/// an image or a video.
pub fn media_kind(path: &Path) -> Option<MediaKind> {
    let mime = mime_guess::from_path(path).first()?;
    match mime.type_().as_str() {
        "image" => Some(MediaKind::Image),
        "video" => Some(MediaKind::Video),
        _ => None,
    }
}

/// Recursively collects media files below `dir`, sorted by path.
/// Hidden files and directories are skipped.
pub fn collect_media_files(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry.map_err(|e| ScanError::Walk {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_type().is_file() && media_kind(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    log::debug!("Found {} media files in {}", files.len(), dir.display());
    Ok(files)
}

/// Imports every given path as a draft asset, returning the stored rows.
pub fn import_files(db: &Database, paths: &[PathBuf]) -> Result<Vec<AssetRow>, DatabaseError> {
    let mut rows = Vec::with_capacity(paths.len());
    for path in paths {
        rows.push(asset_repo::import(db, &path.to_string_lossy())?);
    }
    log::info!("Imported {} assets", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_media_kind() {
        assert_eq!(media_kind(Path::new("a.JPG")), Some(MediaKind::Image));
        assert_eq!(media_kind(Path::new("clip.mp4")), Some(MediaKind::Video));
        assert_eq!(media_kind(Path::new("notes.txt")), None);
        assert_eq!(media_kind(Path::new("noext")), None);
    }

    #[test]
    fn test_collect_skips_hidden_and_non_media() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::create_dir_all(root.join(".cache")).unwrap();
        for name in ["b.png", "a.jpg", "sub/c.mov", "readme.md", ".cache/d.jpg", ".e.jpg"] {
            std::fs::write(root.join(name), b"x").unwrap();
        }

        let files = collect_media_files(root).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "sub/c.mov"]);
    }

    #[test]
    fn test_collect_requires_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.jpg");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            collect_media_files(&file),
            Err(ScanError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_import_files() {
        let db = Database::open_in_memory().unwrap();
        let rows = import_files(
            &db,
            &[PathBuf::from("/p/a.jpg"), PathBuf::from("/p/b.jpg")],
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].filename, "b.jpg");
    }
}
