use std::io::Cursor;

use tracing::{debug, warn};

use super::Context;
use crate::error::{ExtractError, Result};
use crate::scraper::ModuleDescriptor;
use crate::utils::mp3join::Mp3Joiner;

const DATA_FILE: &str = "html5/data/js/data.js";

/// Turns a module descriptor into the module's full lesson audio.
#[derive(Clone)]
pub struct AudioAssembler {
    ctx: Context,
}

impl AudioAssembler {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Resolves the module's asset directory through the SCO loader page,
    /// reads the fragment list from its data file and joins the fragments
    /// in the order they are listed.
    pub async fn download_audio(&self, descriptor: &ModuleDescriptor) -> Result<Cursor<Vec<u8>>> {
        let Context {
            config,
            fetcher,
            extractor,
        } = &self.ctx;

        let loader_page = fetcher
            .fetch_text(&config.loader_url(&descriptor.scorm, &descriptor.sco))
            .await?;
        let base_dir = extractor.extract_base_dir(&loader_page)?;
        debug!(org = %descriptor.current_org, base_dir = %base_dir, "resolved asset directory");

        let data_js = fetcher
            .fetch_text(&format!("{}/{}", base_dir, DATA_FILE))
            .await?;
        let fragments = extractor.extract_fragments(&data_js);
        if fragments.is_empty() {
            return Err(ExtractError::not_found("audio fragments").into());
        }

        // One fragment at a time; output order is listing order.
        let mut joiner = Mp3Joiner::new();
        for fragment in &fragments {
            let audio = fetcher
                .fetch_bytes(&format!("{}/{}", base_dir, fragment))
                .await?;
            debug!(fragment = %fragment, bytes = audio.len(), "fragment");
            joiner.append(&audio);
        }

        if joiner.is_empty() {
            warn!(org = %descriptor.current_org, "all audio fragments were empty");
        }
        debug!(
            org = %descriptor.current_org,
            fragments = joiner.fragments(),
            bytes = joiner.len(),
            "joined audio"
        );
        Ok(joiner.into_reader())
    }
}
