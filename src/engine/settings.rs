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
use crate::error::EngineError;
use crate::store::models::{ChannelId, GuildState, RoleId, Settings};

impl Settings {
    /// Administrators always count as staff.
    pub fn is_staff(&self, roles: &[RoleId], administrator: bool) -> bool {
        administrator || roles.iter().any(|role| self.staff_roles.contains(role))
    }

    pub fn is_admin(&self, roles: &[RoleId], administrator: bool) -> bool {
        administrator || roles.iter().any(|role| self.admin_roles.contains(role))
    }
}

impl GuildState {
    pub fn add_staff_role(&mut self, role: RoleId) -> Result<(), EngineError> {
        add_role(&mut self.settings.staff_roles, role)
    }

    pub fn add_admin_role(&mut self, role: RoleId) -> Result<(), EngineError> {
        add_role(&mut self.settings.admin_roles, role)
    }

    pub fn set_points_channel(&mut self, channel: ChannelId) {
        self.settings.points_channel = Some(channel);
    }

    /// Returns how many quotes the guild has afterwards.
    pub fn add_quote(&mut self, quote: String) -> usize {
        self.settings.daily_quotes.push(quote);
        self.settings.daily_quotes.len()
    }

    /// Removes the quote at `index`, counted from 1 as shown to admins.
    pub fn remove_quote(&mut self, index: usize) -> Result<String, EngineError> {
        let quotes = &mut self.settings.daily_quotes;
        if index == 0 || index > quotes.len() {
            return Err(EngineError::InvalidQuoteIndex {
                index,
                len: quotes.len(),
            });
        }
        Ok(quotes.remove(index - 1))
    }
}

fn add_role(roles: &mut Vec<RoleId>, role: RoleId) -> Result<(), EngineError> {
    if roles.contains(&role) {
        return Err(EngineError::RoleAlreadyConfigured(role));
    }
    roles.push(role);
    Ok(())
}
