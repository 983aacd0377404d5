//! Discovers the config and share directory roots, honouring environment
//! overrides so tests and packaged installs resolve the same way.
//!
//! - `AppPaths::discover` checks environment variables and platform defaults.
//! - `config_file` and `font_roots` encode where run-time inputs are looked up.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "FAKEUPDATE_CONFIG_DIR";
pub const ENV_SHARE_DIR: &str = "FAKEUPDATE_SHARE_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "fakeupdate";
const APPLICATION: &str = "fakeupdate";
const CONFIG_FILE: &str = "fakeupdate.toml";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    share_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let config_override = env_override(ENV_CONFIG_DIR);
        let share_override = env_override(ENV_SHARE_DIR);
        if let (Some(config_dir), Some(share_dir)) = (&config_override, &share_override) {
            return Ok(Self {
                config_dir: config_dir.clone(),
                share_dir: share_dir.clone(),
            });
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        let config_dir =
            config_override.unwrap_or_else(|| project_dirs.config_dir().to_path_buf());
        let share_dir = share_override.unwrap_or_else(|| default_share_dir(&project_dirs));

        Ok(Self {
            config_dir,
            share_dir,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_roots(config_dir: PathBuf, share_dir: PathBuf) -> Self {
        Self {
            config_dir,
            share_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn share_dir(&self) -> &Path {
        &self.share_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    /// Directories scanned for a bundled font, user copies first.
    pub fn font_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.config_dir.join("fonts"), self.share_dir.join("fonts")];
        roots.dedup();
        roots
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(target_family = "unix")]
fn default_share_dir(_: &ProjectDirs) -> PathBuf {
    PathBuf::from("/usr/share/fakeupdate")
}

#[cfg(not(target_family = "unix"))]
fn default_share_dir(project_dirs: &ProjectDirs) -> PathBuf {
    project_dirs.data_dir().to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn env_lock() -> &'static Mutex<()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &Path) -> Self {
            let previous = env::var_os(key);
            env::set_var(key, value);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = self.previous.take() {
                env::set_var(self.key, value);
            } else {
                env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn env_overrides_take_precedence() {
        let _guard = env_lock().lock().unwrap();
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("config");
        let share_dir = root.path().join("share");

        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, &config_dir);
        let _share_guard = EnvGuard::set(ENV_SHARE_DIR, &share_dir);

        let paths = AppPaths::discover().unwrap();

        assert_eq!(paths.config_dir(), config_dir.as_path());
        assert_eq!(paths.share_dir(), share_dir.as_path());
        assert_eq!(paths.config_file(), config_dir.join("fakeupdate.toml"));
        assert_eq!(
            paths.font_roots(),
            vec![config_dir.join("fonts"), share_dir.join("fonts")]
        );
    }

    #[test]
    fn empty_override_is_ignored() {
        let _guard = env_lock().lock().unwrap();
        let _config_guard = EnvGuard::set(ENV_CONFIG_DIR, Path::new(""));
        assert_eq!(env_override(ENV_CONFIG_DIR), None);
    }
}
