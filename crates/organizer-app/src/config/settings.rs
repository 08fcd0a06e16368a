//! Settings loading
//!
//! The host only ever reads its config file; nothing here writes it.

use std::path::{Path, PathBuf};

use organizer_core::prelude::*;

use super::types::Settings;

const CONFIG_DIR_NAME: &str = "file-organizer";
const CONFIG_FILENAME: &str = "config.toml";

/// `<config_dir>/file-organizer/config.toml`, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME))
}

/// Load settings for the host.
///
/// With an explicit path the file must exist and parse. Without one, the
/// default location is tried and any problem there falls back to defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    match explicit {
        Some(path) => load_from_path(path),
        None => Ok(default_config_path()
            .map(|path| load_or_default(&path))
            .unwrap_or_default()),
    }
}

/// Strictly load one config file
pub fn load_from_path(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
    let settings = toml::from_str(&content)
        .map_err(|e| Error::config_invalid(format!("{}: {}", path.display(), e)))?;

    debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Load a config file, falling back to defaults on any problem
pub fn load_or_default(path: &Path) -> Settings {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Settings::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            Settings::default()
        }
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\"))
    };

    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_or_default_missing_file() {
        let temp = tempdir().unwrap();
        let settings = load_or_default(&temp.path().join("config.toml"));

        assert_eq!(settings.worker.program, "python");
        assert_eq!(settings.worker.working_dir, "backend");
        assert_eq!(settings.worker.grace_period_ms, 5000);
        assert!(settings.scanner.watch_dir.is_none());
    }

    #[test]
    fn test_load_from_path_custom() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        let config = r#"
[worker]
program = "/opt/organizer/venv/bin/python"
args = ["-u", "main.py"]
working_dir = ""
grace_period_ms = 1500

[worker.env]
ORGANIZER_PROFILE = "test"

[scanner]
watch_dir = "/srv/inbox"
"#;
        std::fs::write(&path, config).unwrap();

        let settings = load_from_path(&path).unwrap();
        assert_eq!(settings.worker.program, "/opt/organizer/venv/bin/python");
        assert_eq!(settings.worker.args, vec!["-u", "main.py"]);
        assert_eq!(settings.worker.grace_period_ms, 1500);
        assert_eq!(
            settings.worker.env.get("ORGANIZER_PROFILE").map(String::as_str),
            Some("test")
        );
        assert_eq!(settings.scanner.watch_dir.as_deref(), Some("/srv/inbox"));

        let worker = settings.worker.to_worker_config();
        assert_eq!(worker.working_dir, None);
        assert_eq!(worker.args, vec!["-u", "main.py"]);
    }

    #[test]
    fn test_load_from_path_invalid_toml() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[worker\nprogram = ").unwrap();

        let result = load_from_path(&path);
        assert!(matches!(result, Err(Error::ConfigInvalid { .. })));
        assert!(result.unwrap_err().is_fatal());
    }

    #[test]
    fn test_load_or_default_invalid_toml_falls_back() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "this is not toml = = =").unwrap();

        let settings = load_or_default(&path);
        assert_eq!(settings.worker.program, "python");
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nope.toml");

        let result = load_settings(Some(&path));
        assert!(matches!(result, Err(Error::ConfigNotFound { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial_test::serial]
    fn test_load_settings_default_location() {
        let temp = tempdir().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR_NAME);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join(CONFIG_FILENAME),
            "[worker]\ngrace_period_ms = 750\n",
        )
        .unwrap();

        let previous = std::env::var_os("XDG_CONFIG_HOME");
        std::env::set_var("XDG_CONFIG_HOME", temp.path());

        let loaded = load_settings(None);
        let path = default_config_path();

        match previous {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }

        assert_eq!(path, Some(config_dir.join(CONFIG_FILENAME)));
        assert_eq!(loaded.unwrap().worker.grace_period_ms, 750);
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial_test::serial]
    fn test_load_settings_default_location_invalid_falls_back() {
        let temp = tempdir().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR_NAME);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(CONFIG_FILENAME), "[worker\n").unwrap();

        let previous = std::env::var_os("XDG_CONFIG_HOME");
        std::env::set_var("XDG_CONFIG_HOME", temp.path());

        let loaded = load_settings(None);

        match previous {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }

        assert_eq!(loaded.unwrap().worker.program, "python");
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir();
        match home {
            Some(home) => {
                assert_eq!(expand_tilde("~"), home);
                assert_eq!(expand_tilde("~/Downloads"), home.join("Downloads"));
            }
            None => assert_eq!(expand_tilde("~/Downloads"), PathBuf::from("~/Downloads")),
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde("~other/x"), PathBuf::from("~other/x"));
    }
}
