use crate::profile::SessionProfile;
use crate::{Error, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::task::JoinHandle;

/// Chrome flags the portal scrape always runs with.
const BASE_ARGS: [&str; 3] = ["--disable-gpu", "--disable-dev-shm-usage", "--log-level=3"];

/// Launches one Chrome instance per session with its own profile and CDP
/// connection.
pub struct SessionLauncher {
    chrome_path: PathBuf,
    headless: bool,
    window_size: (u32, u32),
}

impl SessionLauncher {
    pub fn new(chrome_path: PathBuf) -> Self {
        Self {
            chrome_path,
            headless: true,
            window_size: (1280, 900),
        }
    }

    /// Show the browser window, for watching a scrape or debugging selectors.
    pub fn with_headful(mut self, headful: bool) -> Self {
        self.headless = !headful;
        self
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn chrome_path(&self) -> &std::path::Path {
        &self.chrome_path
    }

    /// Launch Chrome over the given profile and spawn the CDP handler drain
    /// task. The task must keep running for any page command to complete.
    pub async fn launch(&self, profile: &SessionProfile) -> Result<(Browser, JoinHandle<()>)> {
        tracing::debug!(
            "Launching Chrome at {} (profile {})",
            self.chrome_path.display(),
            profile.path().display()
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&self.chrome_path)
            .user_data_dir(profile.path())
            .no_sandbox()
            .window_size(self.window_size.0, self.window_size.1)
            .args(BASE_ARGS.to_vec());
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(Error::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    // Some CDP events aren't fully parseable; keep draining
                    tracing::debug!("CDP handler event error (continuing): {e}");
                }
            }
        });

        tracing::info!("Chrome session started");
        Ok((browser, handler_task))
    }
}
