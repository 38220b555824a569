//! Agency definition files.
//!
//! An agency lives in a directory:
//!
//! ```text
//! agency/
//! ├── agency.toml
//! ├── manifesto.md
//! └── agents/
//!     └── <Name>/instructions.md
//! ```
//!
//! `agency.toml` names the agents, their tools and the communication chart;
//! prose lives in markdown next to it.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::agency::{AgencyChart, AgencyDefinition, AgentProfile};
use crate::error::{AgentError, Result};

/// File name of the agency manifest inside an agency directory.
pub const AGENCY_FILE: &str = "agency.toml";

const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_PROMPT_TOKENS: usize = 25_000;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgencyFile {
    #[serde(default = "default_manifesto")]
    manifesto: PathBuf,
    entry_points: Vec<String>,
    #[serde(default)]
    flows: Vec<(String, String)>,
    #[serde(default)]
    defaults: Defaults,
    agents: Vec<AgentEntry>,
}

fn default_manifesto() -> PathBuf {
    PathBuf::from("manifesto.md")
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Defaults {
    model: Option<String>,
    temperature: f32,
    max_prompt_tokens: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_prompt_tokens: DEFAULT_MAX_PROMPT_TOKENS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentEntry {
    name: String,
    #[serde(default)]
    description: String,
    /// Relative to the agency directory.
    instructions: Option<PathBuf>,
    #[serde(default)]
    tools: Vec<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_prompt_tokens: Option<usize>,
}

/// Load and validate the agency in `dir`.
pub fn load_agency(dir: impl AsRef<Path>) -> Result<AgencyDefinition> {
    let dir = dir.as_ref();
    let manifest_path = dir.join(AGENCY_FILE);
    let file: AgencyFile = toml::from_str(&read(&manifest_path)?)?;
    debug!(path = %manifest_path.display(), agents = file.agents.len(), "parsed agency manifest");

    let manifesto = read(&dir.join(&file.manifesto))?;

    let defaults = file.defaults;
    let agents = file
        .agents
        .into_iter()
        .map(|entry| -> Result<AgentProfile> {
            let instructions_path = entry
                .instructions
                .unwrap_or_else(|| Path::new("agents").join(&entry.name).join("instructions.md"));
            Ok(AgentProfile {
                instructions: read(&dir.join(instructions_path))?,
                description: entry.description,
                model: entry.model.or_else(|| defaults.model.clone()),
                temperature: Some(entry.temperature.unwrap_or(defaults.temperature)),
                max_prompt_tokens: Some(
                    entry.max_prompt_tokens.unwrap_or(defaults.max_prompt_tokens),
                ),
                tools: entry.tools,
                name: entry.name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let definition = AgencyDefinition {
        manifesto,
        agents,
        chart: AgencyChart {
            entry_points: file.entry_points,
            flows: file.flows,
        },
    };
    definition.validate()?;

    info!(
        dir = %dir.display(),
        agents = definition.agents.len(),
        flows = definition.chart.flows.len(),
        "agency definition loaded"
    );
    Ok(definition)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| AgentError::Io {
        path: path.to_path_buf(),
        source,
    })
}
