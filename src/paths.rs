//! Path resolution for the files sheetdo keeps on the local machine.
//!
//! - Config file (`~/.config/sheetdo[-dev]/config.toml`)
//! - Log directory (`~/.local/share/sheetdo[-dev]/`)
//! - Materialised service-account key
//!   (`~/.local/share/sheetdo[-dev]/credentials.json`)
//!
//! Dev builds (`0.0.0-dev`) use `sheetdo-dev` so they never pick up the
//! config of an installed release.
//!
//! Tests redirect everything under a scratch directory with
//! [`TestPathGuard`]:
//! ```ignore
//! let temp_dir = tempfile::TempDir::new().unwrap();
//! let _guard = TestPathGuard::new(temp_dir.path());
//! assert_eq!(config_file().unwrap(), temp_dir.path().join("config.toml"));
//! ```

use std::cell::RefCell;
use std::path::{Path, PathBuf};

fn app_dir_name() -> &'static str {
    if cfg!(dev_build) {
        "sheetdo-dev"
    } else {
        "sheetdo"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// `~/.config/sheetdo/config.toml`
    Config,
    /// `~/.local/share/sheetdo/`
    LogDir,
    /// `~/.local/share/sheetdo/credentials.json`
    Credentials,
}

#[derive(Debug, PartialEq)]
enum PathStrategy {
    Xdg,
    Override(PathBuf),
}

thread_local! {
    static PATH_STRATEGY: RefCell<PathStrategy> = const { RefCell::new(PathStrategy::Xdg) };
}

/// Resolve a path under the current strategy. `None` when neither the XDG
/// variable nor `HOME` is set.
pub fn resolve(kind: PathKind) -> Option<PathBuf> {
    PATH_STRATEGY.with(|strategy| match *strategy.borrow() {
        PathStrategy::Xdg => resolve_xdg(kind),
        PathStrategy::Override(ref base) => Some(resolve_override(base, kind)),
    })
}

/// `$<var>` if set, else `$HOME/<fallback>`, with the app directory appended.
fn xdg_dir(var: &str, fallback: &[&str]) -> Option<PathBuf> {
    let mut dir = match std::env::var_os(var) {
        Some(xdg) => PathBuf::from(xdg),
        None => {
            let mut home = PathBuf::from(std::env::var_os("HOME")?);
            home.extend(fallback);
            home
        }
    };
    dir.push(app_dir_name());
    Some(dir)
}

fn resolve_xdg(kind: PathKind) -> Option<PathBuf> {
    match kind {
        PathKind::Config => {
            xdg_dir("XDG_CONFIG_HOME", &[".config"]).map(|d| d.join("config.toml"))
        }
        PathKind::LogDir => xdg_dir("XDG_DATA_HOME", &[".local", "share"]),
        PathKind::Credentials => {
            xdg_dir("XDG_DATA_HOME", &[".local", "share"]).map(|d| d.join("credentials.json"))
        }
    }
}

fn resolve_override(base: &Path, kind: PathKind) -> PathBuf {
    match kind {
        PathKind::Config => base.join("config.toml"),
        PathKind::LogDir => base.to_path_buf(),
        PathKind::Credentials => base.join("credentials.json"),
    }
}

pub fn config_file() -> Option<PathBuf> {
    resolve(PathKind::Config)
}

pub fn log_directory() -> Option<PathBuf> {
    resolve(PathKind::LogDir)
}

/// Where a service-account key passed inline through the environment is
/// written before use.
pub fn credentials_file() -> Option<PathBuf> {
    resolve(PathKind::Credentials)
}

/// Resolve every path under `base` on this thread.
pub fn set_test_dir(base: impl Into<PathBuf>) {
    PATH_STRATEGY.with(|strategy| {
        *strategy.borrow_mut() = PathStrategy::Override(base.into());
    });
}

pub fn reset_to_xdg() {
    PATH_STRATEGY.with(|strategy| {
        *strategy.borrow_mut() = PathStrategy::Xdg;
    });
}

/// Scoped [`set_test_dir`]; restores XDG resolution on drop.
pub struct TestPathGuard;

impl TestPathGuard {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        set_test_dir(base_dir);
        TestPathGuard
    }
}

impl Drop for TestPathGuard {
    fn drop(&mut self) {
        reset_to_xdg();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_isolates_paths() {
        let base = PathBuf::from("/test/base");
        let _guard = TestPathGuard::new(&base);

        assert_eq!(config_file(), Some(base.join("config.toml")));
        assert_eq!(log_directory(), Some(base.clone()));
        assert_eq!(credentials_file(), Some(base.join("credentials.json")));
    }

    #[test]
    fn guard_resets_on_drop() {
        {
            let _guard = TestPathGuard::new("/test/base");
        }
        PATH_STRATEGY.with(|s| {
            assert_eq!(*s.borrow(), PathStrategy::Xdg);
        });
    }

    #[test]
    fn override_is_thread_local() {
        let base = PathBuf::from("/test/base1");
        let _guard = TestPathGuard::new(&base);

        let handle = std::thread::spawn(|| {
            PATH_STRATEGY.with(|s| matches!(*s.borrow(), PathStrategy::Xdg))
        });
        assert!(handle.join().unwrap());
        assert_eq!(config_file(), Some(base.join("config.toml")));
    }

    #[test]
    fn xdg_paths_carry_app_dir() {
        reset_to_xdg();
        if let Some(config) = config_file() {
            assert!(config.ends_with(Path::new(app_dir_name()).join("config.toml")));
        }
        if let Some(creds) = credentials_file() {
            assert!(creds.ends_with(Path::new(app_dir_name()).join("credentials.json")));
        }
    }

    #[test]
    fn app_dir_name_matches_build_kind() {
        if cfg!(dev_build) {
            assert_eq!(app_dir_name(), "sheetdo-dev");
        } else {
            assert_eq!(app_dir_name(), "sheetdo");
        }
    }
}
