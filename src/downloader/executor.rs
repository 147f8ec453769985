use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::AudioAssembler;
use crate::error::Result;
use crate::scraper::ModuleDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    /// The output file was already there.
    Skipped { path: PathBuf },
    Downloaded { path: PathBuf, bytes: u64 },
}

/// Removes a half-written output file unless the download completed.
/// Also fires when the task is aborted mid-download.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(err) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), "failed to remove partial file: {}", err);
            }
        }
    }
}

pub fn list_module(descriptor: ModuleDescriptor) -> Result<ModuleDescriptor> {
    println!("{}", descriptor.current_org);
    Ok(descriptor)
}

/// Writes the module's audio to `<out_dir>/<identifier>.mp3`.
///
/// The file is created exclusively, so an existing file (from an earlier run
/// or from a duplicate link in the same run) means the module is skipped.
pub async fn download_module(
    assembler: &AudioAssembler,
    out_dir: &Path,
    descriptor: ModuleDescriptor,
) -> Result<ModuleStatus> {
    let name = descriptor.file_name();
    let path = out_dir.join(&name);

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await
    {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            println!("Skipping {}: file already exist", name);
            return Ok(ModuleStatus::Skipped { path });
        }
        Err(err) => return Err(err.into()),
    };
    let guard = PartialFile::new(path.clone());

    info!("Downloading {}", descriptor.current_org);
    let mut audio = assembler.download_audio(&descriptor).await?;
    let bytes = tokio::io::copy(&mut audio, &mut file).await?;
    file.flush().await?;
    drop(file);
    guard.keep();

    info!(path = %path.display(), bytes, "Done! {}", descriptor.current_org);
    Ok(ModuleStatus::Downloaded { path, bytes })
}
