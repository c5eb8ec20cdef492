use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment override for the Chrome binary location.
const CHROME_ENV: &str = "BLOTTER_CHROME";

/// Names `which` tries on PATH, in preference order.
const PATH_CANDIDATES: [&str; 4] = ["google-chrome", "chromium", "chromium-browser", "chrome"];

/// Locates a Chrome binary: explicit path, then the `BLOTTER_CHROME`
/// environment variable, then PATH, then platform install locations.
pub struct ChromeFinder {
    custom_path: Option<PathBuf>,
}

impl ChromeFinder {
    pub fn new(custom_path: Option<PathBuf>) -> Self {
        Self { custom_path }
    }

    pub fn find(&self) -> Result<PathBuf> {
        if let Some(path) = &self.custom_path {
            return validate(path);
        }

        if let Ok(env_path) = std::env::var(CHROME_ENV) {
            return validate(Path::new(&env_path));
        }

        for name in PATH_CANDIDATES {
            if let Ok(found) = which::which(name) {
                return Ok(found);
            }
        }

        for path in Self::install_locations() {
            if let Ok(valid) = validate(&path) {
                return Ok(valid);
            }
        }

        Err(Error::Browser(format!(
            "Chrome not found on PATH or at: {}. Use --chrome-path or {CHROME_ENV} to specify a location.",
            Self::install_locations()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    fn install_locations() -> Vec<PathBuf> {
        #[cfg(target_os = "macos")]
        return vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ];

        #[cfg(target_os = "linux")]
        return vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/snap/bin/chromium"),
        ];

        #[cfg(target_os = "windows")]
        return vec![
            PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
            PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
        ];

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        return vec![];
    }
}

fn validate(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::Browser(format!(
            "Chrome not found at: {}",
            path.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path)?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(Error::Browser(format!(
                "Chrome at {} is not executable",
                path.display()
            )));
        }
    }

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_custom_path_rejected() {
        let finder = ChromeFinder::new(Some(PathBuf::from("/nonexistent/chrome")));
        assert!(finder.find().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o644)).unwrap();

        let finder = ChromeFinder::new(Some(fake));
        assert!(finder.find().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_custom_path_accepted() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("chrome");
        std::fs::write(&fake, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let finder = ChromeFinder::new(Some(fake.clone()));
        assert_eq!(finder.find().unwrap(), fake);
    }
}
