//! Shared key generation for storage backends.
//!
//! Key format: `uploads/{task_id}{extension}`.

use filetask_core::TaskId;
use std::path::Path;

pub const UPLOAD_PREFIX: &str = "uploads";

/// Generate the object key for an upload.
pub fn object_key(id: &TaskId, file_name: &str) -> String {
    format!("{}/{}{}", UPLOAD_PREFIX, id, extension(file_name))
}

/// Extension of the original file name including the dot, or an empty string.
///
/// Only short alphanumeric extensions are kept so client input cannot inject
/// path separators or odd characters into the key.
pub fn extension(file_name: &str) -> String {
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() && ext.len() <= 16 && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!(".{}", ext)
        }
        _ => String::new(),
    }
}

/// Reject keys that could escape a backend's namespace.
pub fn validate_key(key: &str) -> bool {
    !key.is_empty() && !key.contains("..") && !key.starts_with('/') && !key.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_keeps_extension() {
        let id = TaskId::from_parts(1_700_000_000_000, 1);
        assert_eq!(object_key(&id, "a.png"), format!("uploads/{}.png", id));
        assert_eq!(object_key(&id, "README"), format!("uploads/{}", id));
    }

    #[test]
    fn test_extension_rules() {
        assert_eq!(extension("archive.tar.gz"), ".gz");
        assert_eq!(extension("photo.JPG"), ".JPG");
        assert_eq!(extension(".bashrc"), "");
        assert_eq!(extension("../../etc/passwd"), "");
        assert_eq!(extension("weird.p$g"), "");
        assert_eq!(extension(""), "");
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("uploads/01ABC.png"));
        assert!(!validate_key("../etc/passwd"));
        assert!(!validate_key("/etc/passwd"));
        assert!(!validate_key(""));
    }
}
