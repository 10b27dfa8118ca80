use digest::Digest;
use std::fmt::Formatter;
use std::pin::Pin;

use derive_more::Display;
use futures::TryStreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::AsyncRead;
use tokio_util::compat::FuturesAsyncReadCompatExt;

pub const CURSEFORGE_BASE: &str = "https://www.curseforge.com";

const MOD_PATH: &str = "minecraft/mc-mods";
const RESOURCE_PACK_PATH: &str = "minecraft/texture-packs";

/// Matches CurseForge project links, including ones search engines percent-encode into
/// their redirect URLs (`/` as `%2F`).
static SLUG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)curseforge\.com(?:/|%2F)(?:minecraft(?:/|%2F))?(mc-mods|texture-packs|projects)(?:/|%2F)([a-z0-9_-]+)",
    )
    .expect("slug pattern must compile")
});

/// What a CurseForge project is, as far as where its file should land.
#[derive(Debug, Display, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Category {
    #[display("mod")]
    Mod,
    #[display("resource pack")]
    ResourcePack,
}

impl Category {
    /// Classifies a resolved project page URL. Anything that isn't under the resource pack
    /// template is a mod.
    pub fn of_url(url: &str) -> Self {
        if url.contains(&format!("/{}/", RESOURCE_PACK_PATH)) {
            Category::ResourcePack
        } else {
            Category::Mod
        }
    }

    /// Output subdirectory for this category.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Mod => "mods",
            Category::ResourcePack => "resourcepacks",
        }
    }
}

/// A raw project identifier path segment, tagged with the page kind it was found under.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Slug {
    pub category: Category,
    pub name: String,
}

impl Slug {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    /// Finds the first recognisable project link in `text`.
    ///
    /// `mc-mods/` and the legacy `projects/` pages are mods, `texture-packs/` pages are
    /// resource packs.
    pub fn find_in(text: &str) -> Option<Slug> {
        let captures = SLUG_PATTERN.captures(text)?;
        let category = if captures[1].eq_ignore_ascii_case("texture-packs") {
            Category::ResourcePack
        } else {
            Category::Mod
        };
        Some(Slug::new(category, &captures[2]))
    }

    pub fn canonical_url(&self) -> String {
        let path = match self.category {
            Category::Mod => MOD_PATH,
            Category::ResourcePack => RESOURCE_PACK_PATH,
        };
        format!("{}/{}/{}", CURSEFORGE_BASE, path, self.name)
    }

    pub fn mask(&self) -> String {
        mask_of(&self.name)
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.category)
    }
}

fn mask_of(segment: &str) -> String {
    segment.replace('-', " ")
}

/// Human-friendly label for an arbitrary page URL. Uses the project slug if the URL is a
/// recognisable project link, otherwise its last path segment.
pub fn mask_for_url(url: &str) -> String {
    if let Some(slug) = Slug::find_in(url) {
        return slug.mask();
    }
    let segment = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url);
    mask_of(segment)
}

/// The page listing one specific file of a project.
pub fn file_page_url(project_url: &str, file_id: u32) -> String {
    format!("{}/files/{}", project_url.trim_end_matches('/'), file_id)
}

#[derive(Debug)]
pub struct Hash {
    pub algo: HashAlgorithm,
    pub value: String,
}

impl Hash {
    pub fn check(&self, content: &[u8]) -> bool {
        let Ok(expected_hash) = hex::decode(&self.value) else {
            log::debug!("Ignoring undecodable {} hash {}", self.algo, self.value);
            return false;
        };
        (match self.algo {
            HashAlgorithm::Md5 => md5::Md5::digest(content).to_vec(),
            HashAlgorithm::Sha1 => sha1::Sha1::digest(content).to_vec(),
        }) == expected_hash
    }
}

#[derive(Debug, Display, Copy, Clone, Eq, PartialEq)]
pub enum HashAlgorithm {
    #[display("md5")]
    Md5,
    #[display("sha1")]
    Sha1,
}

pub type BoxAsyncRead = Pin<Box<dyn AsyncRead + Send>>;

pub fn reqwest_async_read(response: reqwest::Response) -> BoxAsyncRead {
    Box::pin(
        response
            .bytes_stream()
            .map_err(|e| futures::io::Error::new(futures::io::ErrorKind::Other, e))
            .into_async_read()
            .compat(),
    )
}
