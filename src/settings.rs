use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::api::RegisterEndpoint;

pub const APP_FOLDER_NAME: &str = "Project-K";
pub const DEFAULT_API_BASE: &str = "http://localhost:8001";
pub const API_URL_ENV: &str = "PROJECT_K_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UiSettings {
    #[serde(default)]
    pub last_theme: Option<String>,
    #[serde(default)]
    pub window_size: Option<(f32, f32)>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    pub version: String,
    pub base_path: String,
    pub mode: String,
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
    /// Seconds before an API request is abandoned by the HTTP client.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Which sign-up route new accounts are created through.
    #[serde(default)]
    pub register_endpoint: RegisterEndpoint,
    #[serde(default)]
    pub ui: UiSettings,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Settings {
    /// Resolve the API base URL: explicit flag, then environment, then the settings file.
    pub fn resolve_api_base(&self, cli_override: Option<&str>) -> String {
        let env_value = std::env::var(API_URL_ENV).ok();
        let chosen = cli_override
            .map(str::to_string)
            .or_else(|| env_value.filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| self.api_base_url.clone());
        chosen.trim().trim_end_matches('/').to_string()
    }
}

pub fn default_base_path() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()));

    if let Some(dir) = exe_dir {
        return dir.join("data");
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_FOLDER_NAME)
}

pub fn ensure_base_folders(base: &Path) -> io::Result<()> {
    let dirs = [
        base.to_path_buf(),
        base.join("config"),
        base.join("logs"),
        base.join("themes"),
    ];

    for d in dirs {
        if !d.exists() {
            fs::create_dir_all(&d)?;
        }
    }

    Ok(())
}

pub fn settings_path(base: &Path) -> PathBuf {
    base.join("config").join("settings.json")
}

pub fn credentials_path(base: &Path) -> PathBuf {
    base.join("config").join("credentials.json")
}

pub fn load_or_init_settings(base: &Path) -> io::Result<Settings> {
    let config_path = settings_path(base);

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let mut settings: Settings = serde_json::from_str(&contents)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("JSON parse error: {e}")))?;

        // Ensure base_path stays in sync with the current base
        if settings.base_path != base.to_string_lossy() {
            settings.base_path = base.to_string_lossy().to_string();
        }
        return Ok(settings);
    }

    let settings = Settings {
        version: env!("CARGO_PKG_VERSION").to_string(),
        base_path: base.to_string_lossy().to_string(),
        mode: "gui".to_string(),
        api_base_url: default_api_base(),
        request_timeout_secs: default_request_timeout(),
        register_endpoint: RegisterEndpoint::default(),
        ui: UiSettings::default(),
    };

    save_settings(&settings, base)?;
    Ok(settings)
}

pub fn save_settings(settings: &Settings, base: &Path) -> io::Result<()> {
    let config_path = settings_path(base);
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("JSON encode error: {e}")))?;
    fs::write(&config_path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_defaults_and_reload_keeps_them() {
        let dir = TempDir::new().unwrap();
        ensure_base_folders(dir.path()).unwrap();

        let created = load_or_init_settings(dir.path()).unwrap();
        assert_eq!(created.api_base_url, DEFAULT_API_BASE);
        assert!(settings_path(dir.path()).exists());

        let mut edited = created.clone();
        edited.api_base_url = "http://school.example:9000".to_string();
        edited.register_endpoint = RegisterEndpoint::RoleSpecific;
        save_settings(&edited, dir.path()).unwrap();
        let raw = fs::read_to_string(settings_path(dir.path())).unwrap();
        assert!(raw.contains(r#""register_endpoint": "role_specific""#));

        let reloaded = load_or_init_settings(dir.path()).unwrap();
        assert_eq!(reloaded.api_base_url, "http://school.example:9000");
        assert_eq!(reloaded.register_endpoint, RegisterEndpoint::RoleSpecific);
    }

    #[test]
    fn older_settings_files_pick_up_new_defaults() {
        let dir = TempDir::new().unwrap();
        ensure_base_folders(dir.path()).unwrap();
        fs::write(
            settings_path(dir.path()),
            r#"{"version":"0.2.0","base_path":"elsewhere","mode":"cli"}"#,
        )
        .unwrap();

        let settings = load_or_init_settings(dir.path()).unwrap();
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE);
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.register_endpoint, RegisterEndpoint::Generic);
        assert_eq!(settings.base_path, dir.path().to_string_lossy());
    }

    #[test]
    fn cli_override_wins_and_trailing_slash_is_dropped() {
        let settings = Settings {
            version: "x".into(),
            base_path: ".".into(),
            mode: "cli".into(),
            api_base_url: "http://from-file".into(),
            request_timeout_secs: 30,
            register_endpoint: RegisterEndpoint::Generic,
            ui: UiSettings::default(),
        };
        assert_eq!(
            settings.resolve_api_base(Some("http://flag.example/")),
            "http://flag.example"
        );
    }
}
