//! Home directory resolution and config loading.
//!
//! Layout under the kaiwa home (default `~/.kaiwa`, overridable with
//! `$KAIWA_HOME` or `--home`):
//!
//! - `config.toml`       engine configuration (all fields optional)
//! - `credentials.json`  the persisted token pair

use kaiwa_core::{ClientConfig, Error};
use std::path::{Path, PathBuf};

/// Resolve the kaiwa home directory. Priority: explicit `--home` flag,
/// `$KAIWA_HOME`, then `~/.kaiwa`.
pub fn kaiwa_home(flag: Option<&Path>) -> Result<PathBuf, Error> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    if let Ok(dir) = std::env::var("KAIWA_HOME") {
        return Ok(PathBuf::from(dir));
    }
    dirs_next::home_dir()
        .map(|home| home.join(".kaiwa"))
        .ok_or_else(|| Error::config("could not determine home directory"))
}

/// Load `config.toml` from the kaiwa home. A missing file is not an error;
/// defaults apply.
pub fn load_config(home: &Path) -> Result<ClientConfig, Error> {
    let path = home.join("config.toml");
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::config(format!("reading {}: {}", path.display(), e)))?;
    ClientConfig::from_toml_str(&content)
}

pub fn credentials_path(home: &Path) -> PathBuf {
    home.join("credentials.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "base_url = \"https://chat.example.com\"\npage_size = 10\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.base_url, "https://chat.example.com");
        assert_eq!(config.page_size, 10);
    }

    #[test]
    fn test_explicit_home_flag_wins() {
        let home = kaiwa_home(Some(Path::new("/tmp/elsewhere"))).unwrap();
        assert_eq!(home, PathBuf::from("/tmp/elsewhere"));
    }
}
