//! Athlete profile persistence: one JSON file per user.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::AthleteProfile;

const MAX_USER_ID_LEN: usize = 64;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("invalid user id '{0}': expected 1-64 characters of [A-Za-z0-9_-]")]
    InvalidUserId(String),

    #[error("invalid profile: {0}")]
    Validation(String),

    #[error("profile i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("profile serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub fn validate_user_id(user_id: &str) -> Result<(), ProfileError> {
    let valid = !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && user_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

    if valid {
        Ok(())
    } else {
        Err(ProfileError::InvalidUserId(user_id.to_string()))
    }
}

pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf, ProfileError> {
        validate_user_id(user_id)?;
        Ok(self.dir.join(format!("{user_id}.json")))
    }

    /// Validate and write, replacing any previous profile for the user.
    pub fn save(&self, profile: &AthleteProfile) -> Result<(), ProfileError> {
        let path = self.path_for(&profile.user_id)?;
        profile.validate()?;

        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, serde_json::to_vec_pretty(profile)?)?;
        std::fs::rename(&staging, &path)?;

        tracing::info!(user_id = %profile.user_id, "profile saved");
        Ok(())
    }

    pub fn get(&self, user_id: &str) -> Result<Option<AthleteProfile>, ProfileError> {
        let path = self.path_for(user_id)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, user_id: &str) -> Result<bool, ProfileError> {
        Ok(self.path_for(user_id)?.is_file())
    }
}
