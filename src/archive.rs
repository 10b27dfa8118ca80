use std::fs::File;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use zip::ZipArchive;

use crate::config::link_list::parse_link_list;
use crate::config::pack::ModpackDescriptor;
use crate::mod_site::reqwest_async_read;

const LIT_MANIFEST: &str = "manifest.json";
const LIT_MODLIST: &str = "modlist.html";

#[derive(Debug, Error)]
pub enum PackSourceError {
    #[error("I/O error on {0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("The pack has no manifest.json")]
    MissingManifest,
    #[error("Malformed manifest.json: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("Downloading the pack failed: {0}")]
    Download(#[from] reqwest::Error),
}

/// Where the modpack comes from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PackSource {
    Archive(PathBuf),
    Directory(PathBuf),
    Remote(String),
}

impl PackSource {
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            PackSource::Remote(source.to_string())
        } else if Path::new(source).is_dir() {
            PackSource::Directory(PathBuf::from(source))
        } else {
            PackSource::Archive(PathBuf::from(source))
        }
    }
}

/// The two documents resolution works from.
#[derive(Debug)]
pub struct PackContents {
    pub descriptor: ModpackDescriptor,
    pub link_list: Vec<String>,
}

/// Reads the manifest and link list out of `source`. For archives, when `extract` is set,
/// every other file is unpacked into `output_dir` as well.
pub async fn open_pack(
    source: &PackSource,
    output_dir: &Path,
    extract: bool,
    client: &reqwest::Client,
) -> Result<PackContents, PackSourceError> {
    let (manifest, modlist) = match source {
        PackSource::Directory(dir) => read_directory(dir)?,
        PackSource::Archive(path) => {
            tokio::task::block_in_place(|| read_archive_file(path, extract.then_some(output_dir)))?
        }
        PackSource::Remote(url) => {
            let path = download_pack(url, output_dir, client).await?;
            tokio::task::block_in_place(|| read_archive_file(&path, extract.then_some(output_dir)))?
        }
    };
    let manifest = manifest.ok_or(PackSourceError::MissingManifest)?;
    let descriptor = ModpackDescriptor::from_json(&manifest)?;
    let link_list = modlist.as_deref().map(parse_link_list).unwrap_or_default();
    if modlist.is_none() {
        log::debug!("Pack has no {}, all mods will be searched for", LIT_MODLIST);
    }

    Ok(PackContents {
        descriptor,
        link_list,
    })
}

fn read_directory(dir: &Path) -> Result<(Option<String>, Option<String>), PackSourceError> {
    let read_optional = |name: &str| {
        let path = dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PackSourceError::Io(path.display().to_string(), e)),
        }
    };
    Ok((read_optional(LIT_MANIFEST)?, read_optional(LIT_MODLIST)?))
}

async fn download_pack(
    url: &str,
    output_dir: &Path,
    client: &reqwest::Client,
) -> Result<PathBuf, PackSourceError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let file_name = response
        .url()
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| s.ends_with(".zip"))
        .unwrap_or("modpack.zip")
        .to_string();
    let dest = output_dir.join(file_name);
    log::info!("Downloading pack from {} to {}", url, dest.display());

    let io_err = |e| PackSourceError::Io(dest.display().to_string(), e);
    let mut file = tokio::fs::File::create(&dest).await.map_err(io_err)?;
    tokio::io::copy(&mut reqwest_async_read(response), &mut file)
        .await
        .map_err(io_err)?;
    file.flush().await.map_err(io_err)?;
    Ok(dest)
}

fn read_archive_file(
    path: &Path,
    extract_to: Option<&Path>,
) -> Result<(Option<String>, Option<String>), PackSourceError> {
    let file = File::open(path).map_err(|e| PackSourceError::Io(path.display().to_string(), e))?;
    read_archive(file, extract_to)
}

/// Walks the archive once: the manifest and link list are kept in memory, everything else
/// is extracted if `extract_to` is set.
fn read_archive<R: Read + Seek>(
    reader: R,
    extract_to: Option<&Path>,
) -> Result<(Option<String>, Option<String>), PackSourceError> {
    let mut zip = ZipArchive::new(reader)?;
    let mut manifest = None;
    let mut modlist = None;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = normalize_entry_name(entry.name()).map(str::to_string) else {
            log::debug!("Skipped archive entry {}", entry.name());
            continue;
        };

        let slot = match name.as_str() {
            LIT_MANIFEST => Some(&mut manifest),
            LIT_MODLIST => Some(&mut modlist),
            _ => None,
        };
        if let Some(slot) = slot {
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| PackSourceError::Io(name.clone(), e))?;
            if let Some(dir) = extract_to {
                let dest = dir.join(&name);
                std::fs::write(&dest, &content)
                    .map_err(|e| PackSourceError::Io(dest.display().to_string(), e))?;
            }
            *slot = Some(String::from_utf8_lossy(&content).into_owned());
            continue;
        }

        if let Some(dir) = extract_to {
            let dest = dir.join(&name);
            let io_err = |e| PackSourceError::Io(dest.display().to_string(), e);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
            std::io::copy(&mut entry, &mut File::create(&dest).map_err(io_err)?).map_err(io_err)?;
            log::debug!("Extracted {}", dest.display());
        }
    }

    Ok((manifest, modlist))
}

/// Drops the first path component of an archive entry, so `overrides/config/a.cfg`
/// becomes `config/a.cfg` while top-level names are left alone. Names that would escape the
/// output directory are rejected.
fn normalize_entry_name(name: &str) -> Option<&str> {
    let stripped = match name.find('/') {
        Some(i) => &name[i + 1..],
        None => name,
    };
    if stripped.is_empty() {
        return None;
    }
    Path::new(stripped)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(stripped)
}
