use crate::Result;
use std::path::Path;
use tempfile::TempDir;

/// A throwaway Chrome profile for one portal session.
///
/// Every session gets its own profile directory so concurrent sessions never
/// share cookies or cache; the directory disappears when the session does.
pub struct SessionProfile {
    dir: TempDir,
}

impl SessionProfile {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("blotter-session-")
            .tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
