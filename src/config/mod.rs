use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub wordlist: Option<String>,
    pub extensions: Option<String>,
    pub keyword: Option<String>,
    pub method: Option<String>,
    #[serde(alias = "body")]
    pub data: Option<String>,
    #[serde(alias = "header")]
    pub headers: Option<String>,
    pub user_agent: Option<String>,
    pub cookie: Option<String>,
    pub follow_redirects: Option<bool>,
    pub proxy: Option<String>,
    pub timeout: Option<u64>,
    pub concurrency: Option<u32>,
    pub sleep: Option<u64>,
    pub max_retries: Option<u8>,
    pub rate: Option<u32>,
    pub hide_status: Option<String>,
    pub hide_size: Option<String>,
    pub hide_words: Option<String>,
    pub hide_lines: Option<String>,
    pub hide_header_size: Option<String>,
    pub show_404: Option<bool>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub no_color: Option<bool>,
    pub no_progress: Option<bool>,
    pub progress_interval: Option<u64>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".kurodo").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

/// Reads a YAML config. A missing file is only an error when the path was
/// given explicitly.
pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Ok(ConfigFile::default()),
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}
