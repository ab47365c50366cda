use anyhow::{Result, bail};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

pub const AVATAR_DIR: &str = "avatars";
pub const CAMPAIGN_IMAGE_DIR: &str = "campaign-images";

/// Writes uploaded images under one root directory.
///
/// Files are stored as `{root}/{kind}/{user_id}-{name}` and the returned
/// relative path (`{kind}/{user_id}-{name}`) is what goes in the database and
/// in URLs.
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(root.join(AVATAR_DIR)).await?;
        fs::create_dir_all(root.join(CAMPAIGN_IMAGE_DIR)).await?;
        info!("Upload directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn avatar_dir(&self) -> PathBuf {
        self.root.join(AVATAR_DIR)
    }

    pub fn campaign_image_dir(&self) -> PathBuf {
        self.root.join(CAMPAIGN_IMAGE_DIR)
    }

    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub async fn save_avatar(&self, user_id: i64, original_name: &str, bytes: &[u8]) -> Result<String> {
        self.save(AVATAR_DIR, user_id, original_name, bytes).await
    }

    pub async fn save_campaign_image(
        &self,
        user_id: i64,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<String> {
        self.save(CAMPAIGN_IMAGE_DIR, user_id, original_name, bytes).await
    }

    async fn save(&self, kind: &str, user_id: i64, original_name: &str, bytes: &[u8]) -> Result<String> {
        if bytes.is_empty() {
            bail!("empty upload");
        }

        let relative = format!("{}/{}-{}", kind, user_id, sanitize_file_name(original_name));
        let path = self.absolute(&relative);

        let mut file = fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        info!("Stored {} ({} bytes)", relative, bytes.len());
        Ok(relative)
    }

    /// Delete a file previously returned by one of the `save_*` methods.
    /// A file that is already gone is not an error.
    pub async fn remove(&self, relative: &str) -> Result<()> {
        match fs::remove_file(self.absolute(relative)).await {
            Ok(()) => {
                info!("Removed {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Last path component of a client-supplied name, restricted to
/// `[A-Za-z0-9._-]`. Never empty and never a dot-only name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();

    if cleaned.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        cleaned
    }
}
