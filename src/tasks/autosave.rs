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
use async_trait::async_trait;
use tokio::time::Duration;
use tracing::trace;

use std::sync::Arc;

use super::Task;
use crate::engine::Engine;

/// Retries the save if the last one failed.
pub struct Autosave {
    engine: Arc<Engine>,
    interval: Duration,
}

impl Autosave {
    pub fn new(engine: Arc<Engine>, interval: Duration) -> Self {
        Self { engine, interval }
    }
}

#[async_trait]
impl Task for Autosave {
    fn name(&self) -> &str {
        "Autosave"
    }

    fn run_in(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> anyhow::Result<()> {
        trace!("Running autosave");
        self.engine.flush_if_dirty().await;
        Ok(())
    }
}
