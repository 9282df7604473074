use crate::error::{Error, Result};
use crate::servers::ServerDescriptor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Where the candidate server list comes from: a reference to load (file
/// path or http(s) URL), or a list given inline in the config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerSource {
    Reference(String),
    Inline(Vec<ServerDescriptor>),
}

impl Default for ServerSource {
    fn default() -> Self {
        ServerSource::Reference("servers.json".to_string())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryLevel {
    #[default]
    Disabled,
    Basic,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub servers: ServerSource,
    pub telemetry: TelemetryLevel,
    pub telemetry_url: Option<String>,
    pub ping_count: usize,
    pub download_size_mb: u64,
    pub upload_size_mb: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            servers: ServerSource::default(),
            telemetry: TelemetryLevel::Disabled,
            telemetry_url: None,
            ping_count: 10,
            download_size_mb: 100,
            upload_size_mb: 50,
        }
    }
}

impl Settings {
    pub fn download_size_bytes(&self) -> u64 {
        self.download_size_mb * 1_000_000
    }

    pub fn upload_size_bytes(&self) -> usize {
        (self.upload_size_mb * 1_000_000) as usize
    }
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    match fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(e.into()),
    }
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(settings)?;
    let mut file = fs::File::create(path)?;
    file.write_all(data.as_bytes())?;
    Ok(())
}
