use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::fs;
use uuid::Uuid;

pub const IMAGES_SUBDIR: &str = "images";
pub const STATIC_URL_PREFIX: &str = "/static";
const DEFAULT_IMAGE_MIME_TYPE: &str = "image/jpeg";
const EXTENSION_MAX_LEN: usize = 10;

/// The static-asset root. Uploaded images land in `{root}/images/`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UploadDir {
    root: PathBuf,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct StoredImage {
    pub file_path: PathBuf,
    /// Path under which the static mount serves the file.
    pub web_path: String,
}

impl UploadDir {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the image under a fresh random name that keeps the upload's extension.
    pub async fn save_image(
        &self,
        bytes: &[u8],
        original_filename: Option<&str>,
    ) -> io::Result<StoredImage> {
        let directory = self.root.join(IMAGES_SUBDIR);
        fs::create_dir_all(&directory).await?;

        let file_name = match original_filename.and_then(extension) {
            Some(extension) => format!("{}.{extension}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        let file_path = directory.join(&file_name);
        fs::write(&file_path, bytes).await?;

        Ok(StoredImage {
            file_path,
            web_path: format!("{STATIC_URL_PREFIX}/{IMAGES_SUBDIR}/{file_name}"),
        })
    }
}

/// Lowercased extension after the last `.`, if it is short and alphanumeric.
#[must_use]
pub fn extension(filename: &str) -> Option<String> {
    let (_, extension) = filename.rsplit_once('.')?;

    (!extension.is_empty()
        && extension.len() <= EXTENSION_MAX_LEN
        && extension.chars().all(|c| c.is_ascii_alphanumeric()))
    .then(|| extension.to_ascii_lowercase())
}

#[must_use]
pub fn image_mime_type(filename: Option<&str>) -> &'static str {
    match filename.and_then(extension).as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => DEFAULT_IMAGE_MIME_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::{UploadDir, extension, image_mime_type};

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(extension("photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension("no_extension"), None);
        assert_eq!(extension("evil./../x"), None);
        assert_eq!(extension("trailing."), None);
    }

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(image_mime_type(Some("a.png")), "image/png");
        assert_eq!(image_mime_type(Some("a.jpeg")), "image/jpeg");
        assert_eq!(image_mime_type(None), "image/jpeg");
    }

    #[tokio::test]
    async fn saved_image_is_served_under_static_prefix() {
        let root = tempfile::tempdir().unwrap();
        let uploads = UploadDir::new(root.path());

        let first = uploads.save_image(b"png bytes", Some("shop.png")).await.unwrap();
        let second = uploads.save_image(b"png bytes", Some("shop.png")).await.unwrap();

        assert!(first.web_path.starts_with("/static/images/"));
        assert!(first.web_path.ends_with(".png"));
        assert_ne!(first.web_path, second.web_path);
        assert_eq!(std::fs::read(&first.file_path).unwrap(), b"png bytes");
    }
}
