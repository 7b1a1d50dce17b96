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
use thiserror::Error;

use crate::store::models::RoleId;

/// Everything an engine operation can refuse to do. The messages are shown to
/// the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("A task named \"{0}\" already exists!")]
    DuplicateTask(String),

    #[error("Task \"{0}\" was not found!")]
    TaskNotFound(String),

    #[error("You already have \"{0}\" active!")]
    AlreadyActive(String),

    #[error("You don't have an active task named \"{0}\"!")]
    NoActiveTask(String),

    #[error("You do not have any active tasks!")]
    NothingActive,

    /// An active record outlived its definition. Removing a task should have
    /// cascaded the record away, so this points at a bug rather than bad input.
    #[error("Task \"{0}\" no longer exists, so its progress has been discarded.")]
    TaskVanished(String),

    #[error("Invalid quote index {index}, there are {len} quotes.")]
    InvalidQuoteIndex { index: usize, len: usize },

    #[error("You have already claimed your daily quote today! Come back tomorrow.")]
    AlreadyClaimedToday,

    #[error("Role {0} is already configured!")]
    RoleAlreadyConfigured(RoleId),
}

impl EngineError {
    /// Errors that still changed the document and therefore need a flush.
    pub fn left_changes(&self) -> bool {
        matches!(self, EngineError::TaskVanished(_))
    }
}
