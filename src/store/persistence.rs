/*
Staff Points Daemon: A discord bot that rewards staff for completing tasks.
Copyright (C) 2024 amFOSS

This program is free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation, either version 3 of the License, or
(at your option) any later version.

This program is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/
use anyhow::Context as _;
use async_trait::async_trait;
use tracing::{debug, trace};

use std::io::ErrorKind;
use std::path::PathBuf;

use super::Document;

/// Somewhere the [`Document`] can be loaded from and saved to in one piece.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Returns `None` when nothing has been saved yet.
    async fn load(&self) -> anyhow::Result<Option<Document>>;
    async fn save(&self, document: &Document) -> anyhow::Result<()>;
}

/// Stores the document as pretty-printed JSON in a single file.
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

#[async_trait]
impl Persistence for JsonFile {
    async fn load(&self) -> anyhow::Result<Option<Document>> {
        trace!("Loading data from {}", self.path.display());
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} does not exist yet", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let document = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(document))
    }

    async fn save(&self, document: &Document) -> anyhow::Result<()> {
        trace!("Saving data to {}", self.path.display());
        let json = serde_json::to_string_pretty(document).context("Failed to serialize data")?;

        // The old file stays in place until the rename.
        let staging = self.staging_path();
        tokio::fs::write(&staging, json)
            .await
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        Ok(())
    }
}
