//! Chrome binary discovery and local launch support.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::discovery::DevToolsEndpoint;
use crate::error::ChannelError;

/// Known Chrome binary locations, in search priority order.
const KNOWN_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/homebrew/bin/chromium",
    "/usr/local/bin/chromium",
];

/// How long to wait for a launched Chrome's endpoint to come up.
const LAUNCH_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Find a Chrome or Chromium binary on the system.
///
/// Search order:
/// 1. `CHROME_PATH` environment variable
/// 2. Known system paths (Linux, then macOS)
///
/// Returns `None` if no valid executable is found.
#[must_use]
pub fn find_chrome() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("CHROME_PATH") {
        let path = PathBuf::from(&env_path);
        if is_executable(&path) {
            return Some(path);
        }
        tracing::debug!(path = %env_path, "CHROME_PATH set but not executable, falling through");
    }

    for candidate in KNOWN_PATHS {
        let path = PathBuf::from(candidate);
        if is_executable(&path) {
            tracing::debug!(path = %candidate, "found Chrome binary");
            return Some(path);
        }
    }

    None
}

/// The ordered list of candidate paths (excluding the env override).
#[must_use]
pub fn search_paths() -> Vec<PathBuf> {
    KNOWN_PATHS.iter().map(PathBuf::from).collect()
}

fn is_executable(path: &Path) -> bool {
    path.is_file()
        && path
            .metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

/// A locally launched headless Chrome with a throwaway profile.
///
/// The profile directory is removed when this is dropped; the child
/// process should be stopped via [`LaunchedChrome::shutdown`].
#[derive(Debug)]
pub struct LaunchedChrome {
    child: Child,
    port: u16,
    _profile_dir: tempfile::TempDir,
}

impl LaunchedChrome {
    /// The remote-debugging port the browser is serving on.
    #[must_use]
    pub fn debug_port(&self) -> u16 {
        self.port
    }

    /// Kill the browser process.
    pub async fn shutdown(mut self) {
        let _ = self.child.kill().await;
    }
}

/// Launch a headless Chrome with remote debugging on a free port and wait
/// for its DevTools endpoint to answer.
pub async fn launch(chrome_path: &Path) -> Result<LaunchedChrome, ChannelError> {
    let port = free_port()?;
    let profile_dir = tempfile::tempdir().map_err(|e| ChannelError::LaunchFailed {
        context: format!("profile dir: {e}"),
    })?;

    let mut child = Command::new(chrome_path)
        .arg("--headless=new")
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg(format!("--remote-debugging-port={port}"))
        .arg(format!("--user-data-dir={}", profile_dir.path().display()))
        .arg("--window-size=1280,800")
        .arg("about:blank")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ChannelError::LaunchFailed {
            context: e.to_string(),
        })?;

    let endpoint = DevToolsEndpoint::new("127.0.0.1", port);
    let deadline = tokio::time::Instant::now() + LAUNCH_READY_TIMEOUT;
    loop {
        if let Some(status) = child.try_wait().map_err(|e| ChannelError::LaunchFailed {
            context: format!("wait: {e}"),
        })? {
            return Err(ChannelError::LaunchFailed {
                context: format!("Chrome exited early with {status}"),
            });
        }
        if endpoint.version().await.is_ok() {
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            let _ = child.kill().await;
            return Err(ChannelError::LaunchFailed {
                context: format!("endpoint on port {port} not ready within {LAUNCH_READY_TIMEOUT:?}"),
            });
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    tracing::info!(port, path = %chrome_path.display(), "launched headless Chrome");
    Ok(LaunchedChrome {
        child,
        port,
        _profile_dir: profile_dir,
    })
}

fn free_port() -> Result<u16, ChannelError> {
    let listener =
        std::net::TcpListener::bind("127.0.0.1:0").map_err(|e| ChannelError::LaunchFailed {
            context: format!("bind port: {e}"),
        })?;
    let port = listener
        .local_addr()
        .map_err(|e| ChannelError::LaunchFailed {
            context: format!("local_addr: {e}"),
        })?
        .port();
    drop(listener);
    Ok(port)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    /// SAFETY: env var mutation is inherently racy in multi-threaded tests.
    /// These tests always restore the previous value.
    fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn restore_env(key: &str, prev: Option<String>) {
        match prev {
            Some(v) => set_env(key, &v),
            None => remove_env(key),
        }
    }

    #[test]
    fn find_chrome_respects_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let fake_chrome = dir.path().join("chrome-test");
        std::fs::write(&fake_chrome, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&fake_chrome, std::fs::Permissions::from_mode(0o755)).unwrap();

        let key = "CHROME_PATH";
        let prev = std::env::var(key).ok();
        set_env(key, fake_chrome.to_str().unwrap());

        let result = find_chrome();
        assert_eq!(result, Some(fake_chrome));

        restore_env(key, prev);
    }

    #[test]
    fn find_chrome_env_var_not_executable_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let not_exec = dir.path().join("not-exec");
        std::fs::write(&not_exec, "not a binary").unwrap();
        std::fs::set_permissions(&not_exec, std::fs::Permissions::from_mode(0o644)).unwrap();

        let key = "CHROME_PATH";
        let prev = std::env::var(key).ok();
        set_env(key, not_exec.to_str().unwrap());

        let result = find_chrome();
        if let Some(ref path) = result {
            assert_ne!(*path, not_exec);
        }

        restore_env(key, prev);
    }

    #[test]
    fn search_paths_are_absolute_and_deterministic() {
        let paths = search_paths();
        assert_eq!(paths.len(), KNOWN_PATHS.len());
        assert_eq!(paths[0], PathBuf::from("/usr/bin/google-chrome"));
        for path in paths {
            assert!(path.is_absolute(), "path should be absolute: {}", path.display());
        }
    }

    #[test]
    fn is_executable_checks_existence_and_mode() {
        assert!(!is_executable(Path::new("/nonexistent/binary")));

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, "hello").unwrap();
        std::fs::set_permissions(&plain, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!is_executable(&plain));

        let script = dir.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_executable(&script));
    }

    #[test]
    fn free_port_is_nonzero() {
        assert_ne!(free_port().unwrap(), 0);
    }
}
