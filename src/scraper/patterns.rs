use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::{Extractor, ModuleDescriptor};
use crate::error::{Error, ExtractError, Result};

static PLAYER_DATA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var scormplayerdata =(.*?);").unwrap());

static PLUGIN_FILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://.*?pluginfile.*?\.html").unwrap());

static AUDIO_FRAGMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"story_content/\w+\.mp3").unwrap());

/// Fixed-pattern extractor for the platform's current markup.
#[derive(Debug, Clone)]
pub struct RegexExtractor {
    module_link: Regex,
}

impl RegexExtractor {
    /// Module links are only recognised when they point back at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let pattern = format!(
            r"{}.*?scorm/view\.php\?id=\d+",
            regex::escape(base_url.trim_end_matches('/'))
        );
        let module_link = Regex::new(&pattern)
            .map_err(|e| Error::invalid_config(format!("module link pattern: {}", e)))?;
        Ok(Self { module_link })
    }
}

impl Extractor for RegexExtractor {
    fn extract_links(&self, course_page: &str) -> Vec<String> {
        self.module_link
            .find_iter(course_page)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn extract_descriptor(&self, module_page: &str) -> Result<ModuleDescriptor, ExtractError> {
        let data = PLAYER_DATA_REGEX
            .captures(module_page)
            .and_then(|caps| caps.get(1))
            .ok_or(ExtractError::not_found("scormplayerdata"))?;

        serde_json::from_str(data.as_str().trim())
            .map_err(|e| ExtractError::malformed("scormplayerdata", e))
    }

    fn extract_base_dir(&self, loader_page: &str) -> Result<String, ExtractError> {
        let found = PLUGIN_FILE_REGEX
            .find(loader_page)
            .ok_or(ExtractError::not_found("pluginfile url"))?;

        let mut url =
            Url::parse(found.as_str()).map_err(|e| ExtractError::malformed("pluginfile url", e))?;
        url.path_segments_mut()
            .map_err(|_| ExtractError::malformed("pluginfile url", "cannot be a base"))?
            .pop();

        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    fn extract_fragments(&self, data_js: &str) -> Vec<String> {
        AUDIO_FRAGMENT_REGEX
            .find_iter(data_js)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}
