//! Canonical file paths for uploaded media.
//!
//! Pictures live under `<media root>/individual_pictures/` and
//! `<media root>/nest_pictures/`, and are served under `/media/`.

use std::path::{Path, PathBuf};

use vespawatch_observation_models::ObservationKind;

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`, falling back to the
/// current directory for relocated binaries.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the default media root, `data/media/`.
#[must_use]
pub fn default_media_root() -> PathBuf {
    project_root().join("data").join("media")
}

/// Returns the directory holding pictures of the given kind.
#[must_use]
pub fn picture_dir(media_root: &Path, kind: ObservationKind) -> PathBuf {
    media_root.join(kind.picture_dir())
}

/// Returns the path of a stored picture relative to the media root.
#[must_use]
pub fn picture_relative_path(kind: ObservationKind, file_name: &str) -> String {
    format!("{}/{file_name}", kind.picture_dir())
}

/// Builds a unique file name that keeps the extension of the upload.
///
/// Only ASCII alphanumeric extensions of at most five characters are kept;
/// anything else is stored as `.bin`.
#[must_use]
pub fn unique_file_name(original: &str, unique: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase);
    format!("{unique}.{ext}")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_image_extension() {
        assert_eq!(unique_file_name("IMG_001.JPG", "abc"), "abc.jpg");
        assert_eq!(unique_file_name("photo.png", "x"), "x.png");
    }

    #[test]
    fn rejects_odd_extensions() {
        assert_eq!(unique_file_name("noext", "abc"), "abc.bin");
        assert_eq!(unique_file_name("evil.p/hp", "abc"), "abc.bin");
        assert_eq!(unique_file_name("archive.toolongext", "abc"), "abc.bin");
    }

    #[test]
    fn relative_path_uses_kind_dir() {
        assert_eq!(
            picture_relative_path(ObservationKind::Nest, "a.jpg"),
            "nest_pictures/a.jpg"
        );
        assert_eq!(
            picture_dir(Path::new("/m"), ObservationKind::Individual),
            PathBuf::from("/m/individual_pictures")
        );
    }
}
