mod patterns;

pub use patterns::RegexExtractor;

use serde::{Deserialize, Deserializer};

use crate::error::ExtractError;

/// One SCORM package in a course, as described by the `scormplayerdata`
/// object on the module's view page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModuleDescriptor {
    /// Organisation identifier; doubles as the output file stem.
    #[serde(rename = "currentorg")]
    pub current_org: String,
    /// Content object id.
    #[serde(deserialize_with = "string_or_number")]
    pub sco: String,
    /// Package id.
    #[serde(deserialize_with = "string_or_number")]
    pub scorm: String,
}

impl ModuleDescriptor {
    /// Name of the audio file for this module. Path separators in the
    /// identifier are replaced so the file always lands in the output dir.
    pub fn file_name(&self) -> String {
        format!("{}.mp3", self.current_org.replace(['/', '\\'], "_"))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

/// Pulls structured values out of the platform's pages.
///
/// Orchestration only talks to this trait, so a markup change upstream
/// means a new implementation rather than edits to the download flow.
pub trait Extractor: Send + Sync {
    /// Module view links on a course page, in document order, duplicates kept.
    fn extract_links(&self, course_page: &str) -> Vec<String>;

    fn extract_descriptor(&self, module_page: &str) -> Result<ModuleDescriptor, ExtractError>;

    /// Directory hosting a module's assets, found on the SCO loader page.
    fn extract_base_dir(&self, loader_page: &str) -> Result<String, ExtractError>;

    /// Relative mp3 paths in a module's `data.js`, in order.
    fn extract_fragments(&self, data_js: &str) -> Vec<String>;
}
