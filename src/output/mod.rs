use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config::pack::ModpackDescriptor;
use crate::mod_site::Category;
use crate::output::mod_download::{FetchError, FetchTarget, Fetcher};
use crate::uwu_colors::{ErrStyle, FAILURE_STYLE, FILE_STYLE, PROJECT_ID_STYLE, SLUG_STYLE};

pub mod mod_download;
pub mod report;

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Creating {0} failed: {1}")]
    CreateDir(String, #[source] std::io::Error),
}

/// Outcome of a batch. Per-entry failures end up here instead of stopping the batch.
#[derive(Debug, Default)]
pub struct AcquisitionReport {
    pub downloaded: Vec<(u32, PathBuf)>,
    /// Entries that had no URL to fetch from.
    pub skipped: Vec<u32>,
    pub failures: Vec<(u32, FetchError)>,
}

impl Display for AcquisitionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} downloaded, {} skipped, {} failed",
            self.downloaded.len(),
            self.skipped.len(),
            self.failures.len()
        )?;
        for (project_id, error) in &self.failures {
            writeln!(f, "Project {}: {}", project_id, error)?;
        }

        Ok(())
    }
}

/// Fetches every resolved entry, one at a time, into `<output_dir>/<category dir>`.
///
/// A failed fetch is logged and recorded, and the next entry is tried. Only failing to
/// create a destination directory stops the batch.
pub async fn acquire_all<F: Fetcher>(
    descriptor: &ModpackDescriptor,
    fetcher: &F,
    output_dir: &Path,
    timeout: Duration,
) -> Result<AcquisitionReport, AcquireError> {
    let mut report = AcquisitionReport::default();
    let total = descriptor.entries.len();
    log::info!(
        "Fetching {} files through the {}",
        total,
        F::NAME.errstyle(FILE_STYLE)
    );

    for (i, entry) in descriptor.entries.iter().enumerate() {
        let (Some(url), Some(category)) = (
            entry.resolved_url.as_ref().filter(|u| !u.is_empty()),
            entry.category(),
        ) else {
            log::warn!(
                "[{}/{}] Skipping project {}, it has no page URL",
                i + 1,
                total,
                entry.project_id.errstyle(PROJECT_ID_STYLE)
            );
            report.skipped.push(entry.project_id);
            continue;
        };

        let dest_dir = destination_dir(output_dir, category).await?;
        let target = FetchTarget {
            project_id: entry.project_id,
            file_id: entry.file_id,
            url: url.clone(),
            category,
            label: entry.label(),
        };
        log::info!(
            "[{}/{}] Fetching {} {} (project {}, file {})",
            i + 1,
            total,
            category,
            target.label.errstyle(SLUG_STYLE),
            entry.project_id.errstyle(PROJECT_ID_STYLE),
            entry.file_id
        );

        let result = tokio::time::timeout(timeout, fetcher.fetch(&target, &dest_dir))
            .await
            .unwrap_or(Err(FetchError::Timeout(timeout)));
        match result {
            Ok(path) => {
                log::info!(
                    "[{}/{}] Downloaded {}",
                    i + 1,
                    total,
                    path.display().errstyle(FILE_STYLE)
                );
                report.downloaded.push((entry.project_id, path));
            }
            Err(e) => {
                log::warn!(
                    "[{}/{}] {} {}: {}",
                    i + 1,
                    total,
                    "FAILED".errstyle(FAILURE_STYLE),
                    target.label.errstyle(SLUG_STYLE),
                    e
                );
                report.failures.push((entry.project_id, e));
            }
        }
    }

    Ok(report)
}

async fn destination_dir(output_dir: &Path, category: Category) -> Result<PathBuf, AcquireError> {
    let dir = output_dir.join(category.dir_name());
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AcquireError::CreateDir(dir.display().to_string(), e))?;
    Ok(dir)
}
