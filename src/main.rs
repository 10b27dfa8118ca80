use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::process::Termination;
use std::sync::Arc;

use clap::Parser;
use furse::Furse;
use log::LevelFilter;
use thiserror::Error;

use crate::archive::{open_pack, PackSource, PackSourceError};
use crate::config::global::{GlobalConfig, GlobalConfigError};
use crate::output::mod_download::{CurseForgeApiFetcher, Fetcher, WebsiteFetcher};
use crate::output::report::{write_report, ReportError};
use crate::output::{acquire_all, AcquireError};
use crate::resolve::search::SearchChain;
use crate::resolve::{ResolveError, Resolver, UnresolvedPolicy};
use crate::uwu_colors::{ErrStyle, FILE_STYLE, SUCCESS_STYLE};

mod archive;
mod config;
mod mod_site;
mod output;
mod progress;
mod resolve;
mod uwu_colors;

/// Unpacks a CurseForge modpack and downloads its mods into a folder.
///
/// Each file in the pack's `manifest.json` is resolved to its CurseForge page, first from the
/// pack's `modlist.html` (paired by position), then by searching for the project ID.
/// Output layout:
/// - `<name>_<version>.txt` listing every file and its resolved page
/// - `mods/` and `resourcepacks/` with the downloaded files
/// - the pack's overrides, extracted in place
#[derive(Parser)]
#[clap(verbatim_doc_comment)]
pub struct Folderizer {
    /// Modpack ZIP, unpacked modpack folder, or URL of a modpack ZIP.
    pub source: String,
    /// Output folder.
    #[clap(short, long, default_value = "ModpackOutput")]
    pub output: PathBuf,
    /// Keep going when a file can't be resolved to a page. Such files are left out of the
    /// download and listed without a link in the report.
    #[clap(long)]
    pub skip_unresolved: bool,
    /// Only use the pack's link list, never search.
    #[clap(long)]
    pub no_search: bool,
    /// Resolve and write the report, but don't download anything.
    #[clap(long)]
    pub no_download: bool,
    /// Don't extract the pack's overrides into the output folder.
    #[clap(long)]
    pub no_extract: bool,
    /// CurseForge API key. Overrides `curse_forge_api_key` in the config file.
    #[clap(long)]
    pub curseforge_api_key: Option<String>,
    /// Config file to use instead of the per-user one.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Verbosity level, repeat to increase.
    #[clap(short, action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

#[derive(Debug, Error)]
enum FolderizerError {
    #[error("Config load error: {0}")]
    Config(#[from] GlobalConfigError),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Creating output folder {0} failed: {1}")]
    OutputDir(String, #[source] std::io::Error),
    #[error("Modpack load error: {0}")]
    PackSource(#[from] PackSourceError),
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
    #[error("Acquisition error: {0}")]
    Acquire(#[from] AcquireError),
}

impl Termination for FolderizerError {
    fn report(self) -> ExitCode {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Folderizer = Folderizer::parse();
    let verbosity = args.verbosity;
    env_logger::Builder::new()
        .filter_level(match verbosity {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .format(move |buf, record| {
            let level_style = buf.default_level_style(record.level());
            write!(
                buf,
                "[{}{}{:#}] ",
                level_style,
                record.level(),
                level_style
            )?;

            if verbosity > 0 {
                // Include the location of the log message if verbose.
                if let Some(p) = record.module_path() {
                    write!(buf, "[{}] ", p)?;
                } else {
                    write!(buf, "[unknown] ")?;
                }
            }

            writeln!(buf, "{}", record.args())
        })
        .init();

    match main_for_result(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            e.report()
        }
    }
}

async fn main_for_result(args: Folderizer) -> Result<(), FolderizerError> {
    let config = GlobalConfig::load(args.config.as_deref())?;
    let api_key = args
        .curseforge_api_key
        .or_else(|| config.curse_forge_api_key.clone())
        .filter(|k| !k.is_empty());
    let furse = api_key.map(|k| Arc::new(Furse::new(&k)));
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .build()?;

    std::fs::create_dir_all(&args.output)
        .map_err(|e| FolderizerError::OutputDir(args.output.display().to_string(), e))?;
    log::info!(
        "Output folder: {}",
        args.output.display().errstyle(FILE_STYLE)
    );

    let pack = open_pack(
        &PackSource::parse(&args.source),
        &args.output,
        !args.no_extract,
        &client,
    )
    .await?;
    let mut descriptor = pack.descriptor;
    log::info!(
        "Loaded {} {} with {} files",
        descriptor.name.errstyle(FILE_STYLE),
        descriptor.version,
        descriptor.entries.len()
    );

    let chain = if args.no_search {
        SearchChain::empty()
    } else {
        SearchChain::from_config(&config.search, furse.clone(), &client)
    };
    let policy = if args.skip_unresolved {
        UnresolvedPolicy::Skip
    } else {
        UnresolvedPolicy::Abort
    };
    let summary = Resolver::new(chain, config.search.concurrency, policy)
        .resolve(&mut descriptor, &pack.link_list)
        .await?;
    log::info!(
        "{}",
        format!(
            "Resolved {} files ({} from the link list, {} by search).",
            summary.paired + summary.searched,
            summary.paired,
            summary.searched
        )
        .errstyle(SUCCESS_STYLE)
    );

    let report_path = write_report(&descriptor, &args.output).await?;
    log::info!("Wrote {}", report_path.display().errstyle(FILE_STYLE));

    if args.no_download {
        log::info!("Skipping downloads.");
    } else {
        let timeout = config.download.timeout();
        let report = match furse {
            Some(furse) => {
                let fetcher = CurseForgeApiFetcher::new(furse, client.clone());
                acquire_all(&descriptor, &fetcher, &args.output, timeout).await?
            }
            None => {
                log::debug!(
                    "No CurseForge API key, using the {}",
                    WebsiteFetcher::NAME
                );
                let fetcher = WebsiteFetcher::new(client.clone());
                acquire_all(&descriptor, &fetcher, &args.output, timeout).await?
            }
        };
        if report.failures.is_empty() {
            log::info!("{}", report.to_string().trim_end().errstyle(SUCCESS_STYLE));
        } else {
            log::warn!("Some files could not be downloaded: {}", report);
        }
    }

    if !summary.unresolved.is_empty() {
        log::warn!(
            "{} files could not be resolved and were skipped: {:?}",
            summary.unresolved.len(),
            summary.unresolved
        );
    }

    Ok(())
}
