mod assembler;
mod executor;
mod planer;

pub use assembler::AudioAssembler;
pub use executor::ModuleStatus;
pub use planer::{CourseProcessor, CourseReport, FailurePolicy};

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Error, ExtractErrorKind, Result};
use crate::fetcher::Fetcher;
use crate::scraper::{Extractor, RegexExtractor};

/// What every unit of work shares: configuration, the HTTP client and the
/// page extractor.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub fetcher: Fetcher,
    pub extractor: Arc<dyn Extractor>,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        let config = config.validate()?;
        let extractor = RegexExtractor::new(&config.base_url)?;
        Self::with_extractor(config, Arc::new(extractor))
    }

    pub fn with_extractor(config: Config, extractor: Arc<dyn Extractor>) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            extractor,
        })
    }
}

/// Prints the identifier of every module in the course.
pub async fn list_course(processor: &CourseProcessor, course_id: &str) -> Result<()> {
    let report = processor
        .process_course(course_id, |descriptor| async move {
            executor::list_module(descriptor)
        })
        .await?;

    finish(report).map(|_| ())
}

/// Downloads every module of the course into `out_dir`, one mp3 per module.
/// Returns the status of each module in course page order.
pub async fn download_course(
    processor: &CourseProcessor,
    assembler: &AudioAssembler,
    out_dir: PathBuf,
    course_id: &str,
) -> Result<Vec<ModuleStatus>> {
    info!("Downloading course {} to {}", course_id, out_dir.display());

    tokio::fs::create_dir_all(&out_dir).await?;

    let assembler = assembler.clone();
    let out_dir = Arc::new(out_dir);
    let report = processor
        .process_course(course_id, move |descriptor| {
            let assembler = assembler.clone();
            let out_dir = Arc::clone(&out_dir);
            async move { executor::download_module(&assembler, &out_dir, descriptor).await }
        })
        .await?;

    let (mut downloaded, mut skipped, mut bytes) = (0usize, 0usize, 0u64);
    for status in report.successes() {
        match status {
            ModuleStatus::Downloaded { bytes: n, .. } => {
                downloaded += 1;
                bytes += n;
            }
            ModuleStatus::Skipped { path } => {
                skipped += 1;
                debug!(path = %path.display(), "kept existing file");
            }
        }
    }
    info!(
        course_id,
        downloaded,
        skipped,
        bytes,
        failed = report.failures().count(),
        "Course finished"
    );

    finish(report)
}

fn finish<T>(report: CourseReport<T>) -> Result<Vec<T>> {
    let course_id = report.course_id.clone();
    report.into_result().map_err(|errs| {
        for (link, err) in errs.errors() {
            error!(course_id = %course_id, link = %link, "module failed: {}", err);
            if let Error::Extract(e) = err {
                if e.kind() == ExtractErrorKind::NotFound {
                    warn!(link = %link, "page layout not recognised, the site markup may have changed");
                }
            }
        }
        error!(course_id = %course_id, failed = errs.len(), "some modules failed");
        Error::Modules(errs)
    })
}
