use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Who is signed in. The bearer token itself lives in the keychain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub warden_id: String,
    /// Hostel from the warden profile, once it has been fetched.
    #[serde(default)]
    pub hostel: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(warden_id: String) -> Self {
        Self {
            warden_id,
            hostel: None,
            username: None,
            created_at: Utc::now(),
        }
    }
}

pub struct Session {
    cache_dir: PathBuf,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            data: None,
        }
    }

    /// Load session from disk. Returns whether one was found.
    pub fn load(&mut self) -> Result<bool> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(false);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        self.data = Some(data);
        Ok(true)
    }

    /// Save session to disk
    pub fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            let path = self.session_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
            }
            let contents = serde_json::to_string_pretty(data)?;
            std::fs::write(path, contents).context("Failed to write session file")?;
        }
        Ok(())
    }

    /// Clear session data
    pub fn clear(&mut self) -> Result<()> {
        self.data = None;
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }

    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    pub fn warden_id(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.warden_id.as_str())
    }

    pub fn hostel(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.hostel.as_deref())
    }

    pub fn is_signed_in(&self) -> bool {
        self.data.is_some()
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        assert!(!session.load().unwrap());

        let mut data = SessionData::new("W-7".to_string());
        data.hostel = Some("16B".to_string());
        session.update(data.clone());
        session.save().unwrap();

        let mut reloaded = Session::new(dir.path().to_path_buf());
        assert!(reloaded.load().unwrap());
        assert_eq!(reloaded.data, Some(data));
        assert_eq!(reloaded.hostel(), Some("16B"));
        assert_eq!(reloaded.warden_id(), Some("W-7"));
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().join("nested"));
        session.update(SessionData::new("W-7".to_string()));
        session.save().unwrap();
        assert!(dir.path().join("nested").join(SESSION_FILE).exists());

        session.clear().unwrap();
        assert!(!session.is_signed_in());
        assert!(!dir.path().join("nested").join(SESSION_FILE).exists());

        // Clearing twice is fine
        session.clear().unwrap();
    }

    #[test]
    fn test_corrupt_session_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        assert!(session.load().is_err());
        assert!(session.data.is_none());
    }
}
