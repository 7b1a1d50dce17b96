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
pub mod models;
pub mod persistence;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::collections::HashMap;

use models::{ActiveTaskRecord, GuildId, GuildState, UserId, UserRecord};

/// The whole persisted state of the bot, keyed by guild id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    guilds: HashMap<GuildId, GuildState>,
}

impl Document {
    /// Returns the guild's state, creating it with default settings on first access.
    pub fn ensure_guild(&mut self, guild_id: GuildId) -> &mut GuildState {
        self.guilds.entry(guild_id).or_insert_with(|| {
            debug!("Initializing state for guild {}", guild_id);
            GuildState::default()
        })
    }

    #[cfg(test)]
    pub fn ensure_user(&mut self, guild_id: GuildId, user_id: UserId) -> &mut UserRecord {
        self.ensure_guild(guild_id).ensure_user(user_id)
    }

    pub fn guild(&self, guild_id: GuildId) -> Option<&GuildState> {
        self.guilds.get(&guild_id)
    }
}

impl GuildState {
    pub fn ensure_user(&mut self, user_id: UserId) -> &mut UserRecord {
        self.users
            .entry(user_id)
            .or_insert_with(|| UserRecord::new(Utc::now()))
    }

    pub fn active_task(&self, user_id: UserId, task_name: &str) -> Option<&ActiveTaskRecord> {
        self.active_tasks
            .get(&user_id)
            .and_then(|tasks| tasks.get(task_name))
    }

    /// Drops a single active record, and the user's ledger entry along with it
    /// once it is empty.
    pub(crate) fn remove_active(
        &mut self,
        user_id: UserId,
        task_name: &str,
    ) -> Option<ActiveTaskRecord> {
        let tasks = self.active_tasks.get_mut(&user_id)?;
        let removed = tasks.remove(task_name);
        if tasks.is_empty() {
            self.active_tasks.remove(&user_id);
        }
        removed
    }
}
