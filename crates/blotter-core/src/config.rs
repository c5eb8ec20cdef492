use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Tunables for one scrape run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Upper bound on concurrently live portal sessions.
    pub max_workers: usize,
    /// Shortest pause before submitting a search, in seconds.
    pub min_delay_secs: u64,
    /// Longest pause before submitting a search, in seconds.
    pub max_delay_secs: u64,
    /// Bounded wait for one query, end to end.
    pub query_timeout_secs: u64,
    /// How far back the portal search window opens.
    pub window_days: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            min_delay_secs: 2,
            max_delay_secs: 5,
            query_timeout_secs: 60,
            window_days: 730,
        }
    }
}

impl ScrapeConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Submit-delay range, normalized so min never exceeds max.
    pub fn delay_range(&self) -> (Duration, Duration) {
        let min = self.min_delay_secs.min(self.max_delay_secs);
        let max = self.min_delay_secs.max(self.max_delay_secs);
        (Duration::from_secs(min), Duration::from_secs(max))
    }

    /// A config with no pacing, for tests and dry runs.
    pub fn without_delays(mut self) -> Self {
        self.min_delay_secs = 0;
        self.max_delay_secs = 0;
        self
    }
}

/// Where the portal lives and how to find its controls. Everything here is
/// defined by the target site, so all of it is configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub search_url: String,
    pub username_selector: String,
    pub password_selector: String,
    pub first_name_selector: String,
    pub last_name_selector: String,
    pub start_date_selector: String,
    pub search_button_selector: String,
    pub results_selector: String,
    pub entry_selector: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            search_url: "https://blotter.example.org/index.cfm?fa=search1".to_string(),
            username_selector: "#username".to_string(),
            password_selector: "#password".to_string(),
            first_name_selector: "#firstName".to_string(),
            last_name_selector: "#lastName".to_string(),
            start_date_selector: "input[name='start_date']".to_string(),
            search_button_selector: "input.btn.btn-md.btn-primary".to_string(),
            results_selector: "#resultspage".to_string(),
            entry_selector: "div[id^='allresults_']".to_string(),
        }
    }
}

/// Portal login. Read-only shared state; workers never mutate it.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

// Keep the password out of logs and debug output.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
