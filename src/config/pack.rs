use serde::{Deserialize, Serialize};

use crate::mod_site::{mask_for_url, Category, Slug};

/// A CurseForge `manifest.json`.
///
/// Only `name`, `version` and `files` are interpreted; everything else is carried along so
/// the manifest can be written back out untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModpackDescriptor {
    #[serde(default)]
    pub minecraft: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_version: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(rename = "files")]
    pub entries: Vec<ModEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModEntry {
    #[serde(rename = "projectID")]
    pub project_id: u32,
    #[serde(rename = "fileID")]
    pub file_id: u32,
    #[serde(default = "required_by_default")]
    pub required: bool,
    #[serde(skip)]
    pub resolved_url: Option<String>,
    #[serde(skip)]
    pub display_mask: Option<String>,
}

fn required_by_default() -> bool {
    true
}

impl ModpackDescriptor {
    /// Parses a manifest, ignoring a leading byte order mark.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text.strip_prefix('\u{feff}').unwrap_or(text))
    }

    /// `<sanitized name>_<version>.txt`. Path separators in the version become `_` so the
    /// report always lands directly in the output directory.
    pub fn report_file_name(&self) -> String {
        format!(
            "{}_{}.txt",
            sanitize_name(&self.name),
            self.version.replace(['/', '\\'], "_")
        )
    }

    pub fn unresolved_ids(&self) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|e| !e.is_resolved())
            .map(|e| e.project_id)
            .collect()
    }
}

impl ModEntry {
    pub fn new(project_id: u32, file_id: u32) -> Self {
        Self {
            project_id,
            file_id,
            required: true,
            resolved_url: None,
            display_mask: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Resolves to an already known page URL, e.g. one from the pack's link list.
    pub fn resolve_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        self.display_mask = Some(mask_for_url(&url));
        self.resolved_url = Some(url);
    }

    /// Resolves to the canonical page of a search hit.
    pub fn resolve_slug(&mut self, slug: &Slug) {
        self.resolved_url = Some(slug.canonical_url());
        self.display_mask = Some(slug.mask());
    }

    pub fn category(&self) -> Option<Category> {
        self.resolved_url.as_deref().map(Category::of_url)
    }

    /// Label for progress output, falls back to the project ID.
    pub fn label(&self) -> String {
        self.display_mask
            .clone()
            .unwrap_or_else(|| format!("project {}", self.project_id))
    }
}

/// Replaces everything outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "minecraft": {
            "version": "1.20.1",
            "modLoaders": [{ "id": "forge-47.2.0", "primary": true }]
        },
        "manifestType": "minecraftModpack",
        "manifestVersion": 1,
        "name": "Test Pack",
        "version": "1.0",
        "author": "someone",
        "files": [
            { "projectID": 100, "fileID": 200, "required": true },
            { "projectID": 101, "fileID": 201, "required": false },
            { "projectID": 102, "fileID": 202 }
        ],
        "overrides": "overrides"
    }"#;

    #[test]
    fn parses_manifest_in_order() {
        let descriptor = ModpackDescriptor::from_json(MANIFEST).unwrap();
        assert_eq!(descriptor.name, "Test Pack");
        assert_eq!(descriptor.version, "1.0");
        let ids = descriptor
            .entries
            .iter()
            .map(|e| (e.project_id, e.file_id, e.required))
            .collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![(100, 200, true), (101, 201, false), (102, 202, true)]
        );
        assert!(descriptor.entries.iter().all(|e| !e.is_resolved()));
    }

    #[test]
    fn minecraft_block_round_trips_untouched() {
        let descriptor = ModpackDescriptor::from_json(MANIFEST).unwrap();
        let written = serde_json::to_value(&descriptor).unwrap();
        let original: serde_json::Value = serde_json::from_str(MANIFEST).unwrap();
        assert_eq!(written["minecraft"], original["minecraft"]);
        assert_eq!(written["files"][0]["projectID"], 100);
        assert!(written["files"][0].get("resolved_url").is_none());
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let descriptor =
            ModpackDescriptor::from_json("\u{feff}{\"name\":\"P\",\"version\":\"1\",\"files\":[]}")
                .unwrap();
        assert_eq!(descriptor.name, "P");
        assert!(descriptor.entries.is_empty());

        let with_bom = format!("\u{feff}{}", MANIFEST);
        assert_eq!(
            ModpackDescriptor::from_json(&with_bom).unwrap().entries.len(),
            3
        );
    }

    #[test]
    fn missing_files_is_an_error() {
        assert!(ModpackDescriptor::from_json(r#"{ "name": "x", "version": "1" }"#).is_err());
        assert!(ModpackDescriptor::from_json("not json").is_err());
    }

    #[test]
    fn sanitize_replaces_non_alphanumerics() {
        assert_eq!(sanitize_name("My Pack!"), "My_Pack_");
        assert_eq!(sanitize_name("!!!"), "___");
        assert_eq!(sanitize_name(""), "");
        assert_eq!(sanitize_name("Pâck"), "P_ck");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for name in ["My Pack!", "All the Mods 9 - ATM9", "ünïcødé", "plain", "a/b\\c"] {
            let once = sanitize_name(name);
            assert_eq!(sanitize_name(&once), once);
        }
    }

    #[test]
    fn report_file_name_uses_sanitized_name() {
        let descriptor = ModpackDescriptor::from_json(MANIFEST).unwrap();
        assert_eq!(descriptor.report_file_name(), "Test_Pack_1.0.txt");
    }

    #[test]
    fn report_file_name_flattens_version_separators() {
        let mut descriptor = ModpackDescriptor::from_json(MANIFEST).unwrap();
        descriptor.version = "1.0/beta".to_string();
        assert_eq!(descriptor.report_file_name(), "Test_Pack_1.0_beta.txt");
        descriptor.version = "/../..\\escaped".to_string();
        assert_eq!(descriptor.report_file_name(), "Test_Pack__.._.._escaped.txt");
    }

    #[test]
    fn resolving_sets_mask_and_category() {
        let mut entry = ModEntry::new(1, 2);
        assert_eq!(entry.category(), None);
        assert_eq!(entry.label(), "project 1");

        entry.resolve_url("https://www.curseforge.com/minecraft/texture-packs/faithful-32x");
        assert!(entry.is_resolved());
        assert_eq!(entry.display_mask.as_deref(), Some("faithful 32x"));
        assert_eq!(entry.category(), Some(Category::ResourcePack));

        entry.resolve_slug(&Slug::new(Category::Mod, "just-enough-items"));
        assert_eq!(
            entry.resolved_url.as_deref(),
            Some("https://www.curseforge.com/minecraft/mc-mods/just-enough-items")
        );
        assert_eq!(entry.label(), "just enough items");
        assert_eq!(entry.category(), Some(Category::Mod));
    }
}
