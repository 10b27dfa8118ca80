use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::pack::ModpackDescriptor;

#[derive(Debug, Error)]
#[error("Writing report {0} failed: {1}")]
pub struct ReportError(String, #[source] std::io::Error);

/// The resolution snapshot: a header, then one line per manifest file in manifest order.
/// Unresolved entries get an empty link.
struct Report<'a>(&'a ModpackDescriptor);

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Modpack Name: {}", self.0.name)?;
        writeln!(f, "Modpack Version: {}", self.0.version)?;
        writeln!(f, "Files:")?;
        for entry in &self.0.entries {
            writeln!(
                f,
                "- Project ID: {}, File ID: {}, Link: {}",
                entry.project_id,
                entry.file_id,
                entry.resolved_url.as_deref().unwrap_or_default()
            )?;
        }

        Ok(())
    }
}

pub fn render_report(descriptor: &ModpackDescriptor) -> String {
    Report(descriptor).to_string()
}

pub async fn write_report(
    descriptor: &ModpackDescriptor,
    output_dir: &Path,
) -> Result<PathBuf, ReportError> {
    let path = output_dir.join(descriptor.report_file_name());
    tokio::fs::write(&path, render_report(descriptor))
        .await
        .map_err(|e| ReportError(path.display().to_string(), e))?;
    Ok(path)
}
