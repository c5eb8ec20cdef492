use crate::launcher::SessionLauncher;
use crate::profile::SessionProfile;
use crate::{Error, Result};
use async_trait::async_trait;
use blotter_core::record::{
    BookingRecord, RecordSchema, determine_custody, fields, parse_portal_date, time_served_days,
};
use blotter_core::{Credentials, FailureReason, PortalConfig, ScrapeConfig, SearchQuery};
use blotter_scraper::{Session, SessionFactory};
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide::element::Element;
use chrono::{Local, NaiveDateTime};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Bounded wait for any single element to show up.
const ELEMENT_WAIT: Duration = Duration::from_secs(20);
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where a session is in its scrape lifecycle. Phases only move forward
/// within one search; a finished search leaves the session ready for the
/// next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotStarted,
    LoggedIn,
    Submitted,
    Rendered,
    Parsed,
}

/// One authenticated Chrome instance driving the booking portal.
///
/// Exactly one query runs on a session at a time; the coordinator owns that
/// guarantee, this type owns the page choreography.
pub struct PortalSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    _profile: SessionProfile,
    portal: Arc<PortalConfig>,
    schema: Arc<RecordSchema>,
    window_days: u64,
    phase: Phase,
}

impl PortalSession {
    /// Launch a browser, log in, and hand back a session ready to search.
    async fn open(
        launcher: &SessionLauncher,
        credentials: &Credentials,
        portal: Arc<PortalConfig>,
        schema: Arc<RecordSchema>,
        window_days: u64,
    ) -> Result<Self> {
        let profile = SessionProfile::new()?;
        let (browser, handler_task) = launcher.launch(&profile).await?;
        let page = browser.new_page("about:blank").await?;

        let mut session = Self {
            browser,
            page,
            handler_task,
            _profile: profile,
            portal,
            schema,
            window_days,
            phase: Phase::NotStarted,
        };
        session.login(credentials).await?;
        Ok(session)
    }

    async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        tracing::debug!("Logging in to {}", self.portal.search_url);
        self.page.goto(self.portal.search_url.as_str()).await?;

        let username = self.wait_for(&self.portal.username_selector).await?;
        username.type_str(credentials.username()).await?;

        let password = self.wait_for(&self.portal.password_selector).await?;
        password.type_str(credentials.password()).await?;
        password.press_key("Enter").await?;

        // The search form appearing is the login-success signal
        self.wait_for(&self.portal.first_name_selector).await?;
        self.advance(Phase::LoggedIn);
        tracing::info!("Portal login successful");
        Ok(())
    }

    async fn run_search(&mut self, query: &SearchQuery) -> Result<Vec<BookingRecord>> {
        self.submit(query).await?;
        let texts = self.collect_entries().await?;

        let records = parse_entries(&self.schema, query, &texts, Local::now().naive_local())
            .map_err(Error::Parse)?;
        self.advance(Phase::Parsed);

        tracing::debug!("Parsed {} records for {}", records.len(), query);
        Ok(records)
    }

    async fn submit(&mut self, query: &SearchQuery) -> Result<()> {
        // Back to the search form; the profile's cookies carry the login
        self.page.goto(self.portal.search_url.as_str()).await?;
        self.await_search_form().await?;

        self.clear_and_type(&self.portal.first_name_selector, query.first_name())
            .await?;
        self.clear_and_type(&self.portal.last_name_selector, query.last_name())
            .await?;
        self.set_search_window().await?;

        let button = self.wait_for(&self.portal.search_button_selector).await?;
        button.click().await?;
        self.advance(Phase::Submitted);
        Ok(())
    }

    /// After navigation either the search form or the login form shows up;
    /// the login form means our authentication lapsed.
    async fn await_search_form(&self) -> Result<()> {
        let deadline = Instant::now() + ELEMENT_WAIT;
        loop {
            if self
                .page
                .find_element(self.portal.first_name_selector.as_str())
                .await
                .is_ok()
            {
                return Ok(());
            }

            if self
                .page
                .find_element(self.portal.username_selector.as_str())
                .await
                .is_ok()
            {
                tracing::warn!("Login form re-appeared; session authentication expired");
                return Err(Error::AuthExpired);
            }

            if Instant::now() >= deadline {
                return Err(Error::Browser(format!(
                    "search form did not appear within {ELEMENT_WAIT:?}"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn clear_and_type(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.wait_for(selector).await?;
        self.page
            .evaluate(format!("document.querySelector({selector:?}).value = ''"))
            .await?;
        if !text.is_empty() {
            element.click().await?;
            element.type_str(text).await?;
        }
        Ok(())
    }

    /// The start-date field ignores keystrokes, so set it the way the site's
    /// own scripts do and fire the change event.
    async fn set_search_window(&self) -> Result<()> {
        let start_date = (Local::now().date_naive() - chrono::Days::new(self.window_days))
            .format("%m/%d/%Y")
            .to_string();

        let js = format!(
            "(() => {{ const el = document.querySelector({:?}); if (el) {{ el.value = {:?}; el.dispatchEvent(new Event('change')); }} }})()",
            self.portal.start_date_selector, start_date
        );
        self.page.evaluate(js).await?;

        tracing::debug!("Search window opens {}", start_date);
        Ok(())
    }

    async fn collect_entries(&mut self) -> Result<Vec<String>> {
        if self.wait_for(&self.portal.results_selector).await.is_err() {
            return Err(Error::Browser("results page never rendered".to_string()));
        }
        self.advance(Phase::Rendered);

        let elements = self
            .page
            .find_elements(self.portal.entry_selector.as_str())
            .await?;

        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            if let Ok(Some(text)) = element.inner_text().await {
                let trimmed = text.trim().to_string();
                if !trimmed.is_empty() {
                    texts.push(trimmed);
                }
            }
        }
        Ok(texts)
    }

    async fn wait_for(&self, selector: &str) -> Result<Element> {
        let deadline = Instant::now() + ELEMENT_WAIT;
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(_) if Instant::now() < deadline => tokio::time::sleep(POLL_INTERVAL).await,
                Err(e) => {
                    return Err(Error::Browser(format!(
                        "element {selector:?} not found within {ELEMENT_WAIT:?}: {e}"
                    )));
                }
            }
        }
    }

    fn advance(&mut self, to: Phase) {
        tracing::trace!("Session phase {:?} -> {:?}", self.phase, to);
        self.phase = to;
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Browser close: {e}");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

#[async_trait]
impl Session for PortalSession {
    async fn search(
        &mut self,
        query: &SearchQuery,
    ) -> std::result::Result<Vec<BookingRecord>, FailureReason> {
        self.run_search(query).await.map_err(Error::into_failure)
    }

    async fn close(self: Box<Self>) {
        (*self).shutdown().await;
    }
}

/// Builds one logged-in [`PortalSession`] per call. Shared, read-only state
/// lives here: credentials, portal layout, and the extraction schema.
pub struct PortalSessionFactory {
    launcher: SessionLauncher,
    credentials: Credentials,
    portal: Arc<PortalConfig>,
    schema: Arc<RecordSchema>,
    window_days: u64,
}

impl PortalSessionFactory {
    pub fn new(
        chrome_path: PathBuf,
        credentials: Credentials,
        portal: PortalConfig,
        config: &ScrapeConfig,
    ) -> Self {
        Self {
            launcher: SessionLauncher::new(chrome_path),
            credentials,
            portal: Arc::new(portal),
            schema: Arc::new(RecordSchema::booking_default()),
            window_days: config.window_days,
        }
    }

    pub fn with_headful(mut self, headful: bool) -> Self {
        self.launcher = self.launcher.with_headful(headful);
        self
    }

    /// Swap in different extraction rules when the portal's markup changes.
    pub fn with_schema(mut self, schema: RecordSchema) -> Self {
        self.schema = Arc::new(schema);
        self
    }
}

#[async_trait]
impl SessionFactory for PortalSessionFactory {
    async fn create(&self) -> std::result::Result<Box<dyn Session>, FailureReason> {
        let session = PortalSession::open(
            &self.launcher,
            &self.credentials,
            Arc::clone(&self.portal),
            Arc::clone(&self.schema),
            self.window_days,
        )
        .await
        .map_err(Error::into_failure)?;

        Ok(Box::new(session))
    }
}

/// Turn rendered entry texts into records, stamping the identity, custody,
/// and time-served fields the schema alone can't know.
fn parse_entries(
    schema: &RecordSchema,
    query: &SearchQuery,
    texts: &[String],
    as_of: NaiveDateTime,
) -> std::result::Result<Vec<BookingRecord>, String> {
    let mut records = Vec::with_capacity(texts.len());

    for (index, text) in texts.iter().enumerate() {
        let mut record = schema.extract(text).ok_or_else(|| {
            format!("result entry {} did not match the record schema", index + 1)
        })?;

        let booking = record.get(fields::BOOKING_DATE).and_then(parse_portal_date);
        let release = record.get(fields::RELEASE_DATE).and_then(parse_portal_date);
        let release_text = record.get(fields::RELEASE_DATE).unwrap_or("").to_string();
        let facility_text = record.get(fields::FACILITY).unwrap_or("").to_string();

        record.set(fields::NAME, query.to_string());
        record.set(
            fields::STATUS,
            determine_custody(&release_text, &facility_text, as_of).as_str(),
        );
        if let Some(booking) = booking {
            record.set(
                fields::TIME_SERVED_DAYS,
                time_served_days(booking, release, as_of).to_string(),
            );
        }

        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = "\
Booking Number: 2024001234
Booking Date/Time:
03/01/2024 10:15
Release Date: 03/10/24
Charges:
BURGLARY / DWELLING
Facility: NO FILE";

    fn as_of() -> NaiveDateTime {
        parse_portal_date("06/01/2024 12:00").unwrap()
    }

    fn query() -> SearchQuery {
        SearchQuery::new("Doe", "John").unwrap()
    }

    #[test]
    fn test_parse_entries_stamps_derived_fields() {
        let schema = RecordSchema::booking_default();
        let records =
            parse_entries(&schema, &query(), &[ENTRY.to_string()], as_of()).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get(fields::NAME), Some("Doe, John"));
        assert_eq!(record.get(fields::STATUS), Some("Released"));
        assert_eq!(record.get(fields::TIME_SERVED_DAYS), Some("10"));
        assert_eq!(record.get(fields::BOOKING_NUMBER), Some("2024001234"));
    }

    #[test]
    fn test_parse_entries_empty_is_ok() {
        let schema = RecordSchema::booking_default();
        let records = parse_entries(&schema, &query(), &[], as_of()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_unparseable_entry_is_an_error() {
        let schema = RecordSchema::booking_default();
        let result = parse_entries(
            &schema,
            &query(),
            &["<div>nothing recognizable</div>".to_string()],
            as_of(),
        );

        let message = result.unwrap_err();
        assert!(message.contains("did not match"));
    }

    #[test]
    fn test_open_booking_counts_days_to_now() {
        let schema = RecordSchema::booking_default();
        let open_entry = "\
Booking Number: 555
Booking Date/Time:
05/28/2024 08:00
Charges:
TRESPASSING
Facility: CENTRAL DETENTION";

        let records =
            parse_entries(&schema, &query(), &[open_entry.to_string()], as_of()).unwrap();
        let record = &records[0];

        assert_eq!(record.get(fields::STATUS), Some("In Custody"));
        // 05/28 through 06/01 inclusive
        assert_eq!(record.get(fields::TIME_SERVED_DAYS), Some("5"));
        assert_eq!(record.get(fields::RELEASE_DATE), Some("N/A"));
    }
}
