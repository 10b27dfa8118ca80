use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use furse::structures::file_structs::HashAlgo;
use furse::Furse;
use indicatif::ProgressBar;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{CONTENT_DISPOSITION, REFERER};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::mod_site::{
    file_page_url, reqwest_async_read, Category, Hash, HashAlgorithm, CURSEFORGE_BASE,
};
use crate::progress::{steady_tick_duration, style_bar, style_spinner};

/// One resolved entry, as handed to a [Fetcher].
#[derive(Debug, Clone)]
pub struct FetchTarget {
    pub project_id: u32,
    pub file_id: u32,
    /// The resolved project page.
    pub url: String,
    pub category: Category,
    pub label: String,
}

impl FetchTarget {
    pub fn file_page_url(&self) -> String {
        file_page_url(&self.url, self.file_id)
    }
}

/// Downloads a single target's file into a directory.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    const NAME: &'static str;

    /// Returns the path of the written file.
    async fn fetch(&self, target: &FetchTarget, dest_dir: &Path) -> Result<PathBuf, FetchError>;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("CurseForge Error: {0}")]
    Furse(#[from] furse::Error),
    #[error("ID {0} is out of range for the CurseForge API")]
    IdOutOfRange(u32),
    #[error("The mod does not allow third-party distribution, download it by hand from {0}")]
    DistributionDenied(String),
    #[error("Refusing to write to unsafe file name {0:?}")]
    BadFileName(String),
    #[error("Downloaded file does not match its {0} hash")]
    HashMismatch(HashAlgorithm),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Fetches files through the authenticated CurseForge API.
pub struct CurseForgeApiFetcher {
    furse: Arc<Furse>,
    client: reqwest::Client,
}

impl CurseForgeApiFetcher {
    pub fn new(furse: Arc<Furse>, client: reqwest::Client) -> Self {
        Self { furse, client }
    }
}

#[async_trait::async_trait]
impl Fetcher for CurseForgeApiFetcher {
    const NAME: &'static str = "CurseForge API";

    async fn fetch(&self, target: &FetchTarget, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let project_id =
            i32::try_from(target.project_id).map_err(|_| FetchError::IdOutOfRange(target.project_id))?;
        let file_id =
            i32::try_from(target.file_id).map_err(|_| FetchError::IdOutOfRange(target.file_id))?;
        let file = self.furse.get_mod_file(project_id, file_id).await?;

        let mut sha1 = None;
        let mut md5 = None;
        for hash in file.hashes {
            if hash.algo == HashAlgo::Sha1 {
                sha1 = Some(hash.value);
            } else if hash.algo == HashAlgo::Md5 {
                md5 = Some(hash.value);
            }
        }
        let hash = sha1
            .map(|v| Hash {
                algo: HashAlgorithm::Sha1,
                value: v,
            })
            .or_else(|| {
                md5.map(|v| Hash {
                    algo: HashAlgorithm::Md5,
                    value: v,
                })
            });

        let dest_file = dest_dir.join(checked_file_name(&file.file_name)?);
        if let Some(hash) = &hash {
            if dest_file.exists() {
                // Check if we already have the file.
                let content = tokio::fs::read(&dest_file).await?;
                if hash.check(&content) {
                    log::info!("Found cached {}", file.file_name);
                    return Ok(dest_file);
                }
            }
        }

        let url = file
            .download_url
            .ok_or_else(|| FetchError::DistributionDenied(target.file_page_url()))?;
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await?
            .error_for_status()?;
        stream_to_file(response, &dest_file, &target.label).await?;

        if let Some(hash) = hash {
            let content = tokio::fs::read(&dest_file).await?;
            if !hash.check(&content) {
                tokio::fs::remove_file(&dest_file).await?;
                return Err(FetchError::HashMismatch(hash.algo));
            }
        }

        Ok(dest_file)
    }
}

/// Fetches files through the download endpoint the CurseForge website uses, which needs no
/// API key.
pub struct WebsiteFetcher {
    base: String,
    client: reqwest::Client,
}

impl WebsiteFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base(CURSEFORGE_BASE, client)
    }

    pub fn with_base(base: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base: base.into(),
            client,
        }
    }

    fn download_url(&self, target: &FetchTarget) -> String {
        format!(
            "{}/api/v1/mods/{}/files/{}/download",
            self.base.trim_end_matches('/'),
            target.project_id,
            target.file_id
        )
    }
}

#[async_trait::async_trait]
impl Fetcher for WebsiteFetcher {
    const NAME: &'static str = "CurseForge website";

    async fn fetch(&self, target: &FetchTarget, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let response = self
            .client
            .get(self.download_url(target))
            .header(REFERER, target.file_page_url())
            .send()
            .await?
            .error_for_status()?;

        let file_name = response_file_name(&response).unwrap_or_else(|| {
            let extension = match target.category {
                Category::Mod => "jar",
                Category::ResourcePack => "zip",
            };
            format!("{}-{}.{}", target.project_id, target.file_id, extension)
        });
        let dest_file = dest_dir.join(checked_file_name(&file_name)?);
        stream_to_file(response, &dest_file, &target.label).await?;

        Ok(dest_file)
    }
}

static DISPOSITION_FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#).expect("disposition pattern must compile")
});

/// Prefers `Content-Disposition`, then the last segment of the (post-redirect) URL.
fn response_file_name(response: &reqwest::Response) -> Option<String> {
    let from_header = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DISPOSITION_FILE_NAME.captures(v))
        .map(|c| c[1].trim().to_string());
    from_header.or_else(|| url_file_name(response.url()))
}

fn url_file_name(url: &reqwest::Url) -> Option<String> {
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.to_string())
}

fn checked_file_name(name: &str) -> Result<&str, FetchError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(FetchError::BadFileName(name.to_string()));
    }
    Ok(name)
}

/// Streams `response` into `dest_file` through a `.part` file, so a failed download never
/// leaves a truncated file under the real name.
async fn stream_to_file(
    response: reqwest::Response,
    dest_file: &Path,
    label: &str,
) -> Result<(), FetchError> {
    let progress_bar = match response.content_length() {
        Some(len) => ProgressBar::new(len).with_style(style_bar()),
        None => {
            let bar = ProgressBar::new_spinner().with_style(style_spinner());
            bar.enable_steady_tick(steady_tick_duration());
            bar
        }
    };
    progress_bar.set_message(label.to_string());

    let mut part_name = dest_file.as_os_str().to_owned();
    part_name.push(".part");
    let part_file = PathBuf::from(part_name);

    let result = async {
        let mut file = tokio::fs::File::create(&part_file).await?;
        tokio::io::copy(
            &mut progress_bar.wrap_async_read(reqwest_async_read(response)),
            &mut file,
        )
        .await?;
        file.flush().await?;
        tokio::fs::rename(&part_file, dest_file).await
    }
    .await;
    progress_bar.finish_and_clear();

    if let Err(e) = result {
        if let Err(cleanup) = tokio::fs::remove_file(&part_file).await {
            log::debug!("Could not remove {}: {}", part_file.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}
