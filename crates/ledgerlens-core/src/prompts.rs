//! Prompt library for the LedgerLens agents
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/ledgerlens/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Each prompt is markdown with YAML frontmatter and `# System` / `# User`
//! sections. `{{name}}` placeholders are substituted at render time.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const REPORT_AGENT: &str = include_str!("../../../prompts/report_agent.md");
    pub const REPORT_SYNTHESIS: &str = include_str!("../../../prompts/report_synthesis.md");
    pub const ADVISOR_AGENT: &str = include_str!("../../../prompts/advisor_agent.md");
    pub const ADVISOR_SYNTHESIS: &str = include_str!("../../../prompts/advisor_synthesis.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// System prompt and context instructions for the report agent
    ReportAgent,
    /// Final structured-report request
    ReportSynthesis,
    /// System prompt for the conversational advisor
    AdvisorAgent,
    /// Final structured-answer request
    AdvisorSynthesis,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReportAgent => "report_agent",
            Self::ReportSynthesis => "report_synthesis",
            Self::AdvisorAgent => "advisor_agent",
            Self::AdvisorSynthesis => "advisor_synthesis",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[
            Self::ReportAgent,
            Self::ReportSynthesis,
            Self::AdvisorAgent,
            Self::AdvisorSynthesis,
        ]
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::ReportAgent => defaults::REPORT_AGENT,
            Self::ReportSynthesis => defaults::REPORT_SYNTHESIS,
            Self::AdvisorAgent => defaults::ADVISOR_AGENT,
            Self::AdvisorSynthesis => defaults::ADVISOR_SYNTHESIS,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// Which agent uses the prompt (report, advisor)
    pub agent: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// Body after the frontmatter
    pub content: String,
    pub is_override: bool,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the user section (or the whole body if it has none)
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        render(self.user_section().unwrap_or(&self.content), vars)
    }
}

fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let pattern = format!("{{{{{}}}}}", key);
        result = result.replace(&pattern, value);
    }
    result
}

/// All agent prompts, resolved once at construction
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
    prompts: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Load with the default override directory
    pub fn new() -> Result<Self> {
        Self::load(default_prompts_dir())
    }

    pub fn with_override_dir(path: PathBuf) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Embedded defaults only
    pub fn embedded_only() -> Result<Self> {
        Self::load(None)
    }

    fn load(override_dir: Option<PathBuf>) -> Result<Self> {
        let mut prompts = HashMap::new();
        for &id in PromptId::all() {
            prompts.insert(id, load_prompt(override_dir.as_ref(), id)?);
        }
        Ok(Self {
            override_dir,
            prompts,
        })
    }

    pub fn get(&self, id: PromptId) -> Result<&Prompt> {
        self.prompts
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("prompt {}", id.as_str())))
    }

    /// System section of a prompt, empty if it has none
    pub fn system(&self, id: PromptId) -> Result<String> {
        Ok(self.get(id)?.system_section().unwrap_or_default().to_string())
    }

    /// Rendered user section of a prompt
    pub fn user(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<String> {
        Ok(self.get(id)?.render_user(vars))
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }
}

/// Load a prompt (checking override first, then default)
fn load_prompt(override_dir: Option<&PathBuf>, id: PromptId) -> Result<Prompt> {
    if let Some(dir) = override_dir {
        let path = dir.join(format!("{}.md", id.as_str()));
        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::InvalidData(format!("Failed to read prompt override: {}", e))
            })?;
            let (metadata, body) = parse_prompt(&content)?;
            return Ok(Prompt {
                metadata,
                content: body,
                is_override: true,
            });
        }
    }

    let (metadata, body) = parse_prompt(id.default_content())?;
    Ok(Prompt {
        metadata,
        content: body,
        is_override: false,
    })
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ledgerlens").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let Some(rest) = content.strip_prefix("---") else {
        return Err(Error::InvalidData(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    };

    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    // Up to the next header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}
