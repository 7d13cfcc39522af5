use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "chatline";
const FILE_NAME: &str = "session.json";

#[derive(Serialize, Deserialize, Default)]
struct StoredSession {
    /// Base64 of the session token.
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_token: Option<String>,
}

/// Durable home of the single session token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    /// `<config dir>/chatline/session.json`, creating the directory if needed.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?
            .join(APP_DIR);

        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }

        Ok(Self::at(dir.join(FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            debug!("No stored session at {}", self.path.display());
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let stored: StoredSession = serde_json::from_str(&contents)?;

        let token = match stored.chat_token {
            Some(encoded) => String::from_utf8(BASE64.decode(encoded)?)?,
            None => return Ok(None),
        };
        if token.is_empty() {
            return Ok(None);
        }

        info!("Loaded session token from {}", self.path.display());
        Ok(Some(token))
    }

    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let stored = StoredSession {
            chat_token: Some(BASE64.encode(token)),
        };
        let file = File::create(&self.path)
            .with_context(|| format!("writing {}", self.path.display()))?;
        serde_json::to_writer_pretty(file, &stored)?;

        info!("Session token saved to {}", self.path.display());
        Ok(())
    }
}
