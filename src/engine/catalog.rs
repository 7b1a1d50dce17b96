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
use chrono::Utc;
use tracing::{debug, trace};

use crate::error::EngineError;
use crate::store::models::{ChannelId, GuildState, TaskDefinition, TaskType, UserId};

/// Input for [`GuildState::define_task`]. Range checks on `points` and
/// `required_actions` are done by the command layer.
#[derive(Clone, Debug)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub points: u64,
    pub required_actions: u32,
    pub kind: TaskType,
    pub bound_channel: Option<ChannelId>,
    pub created_by: UserId,
}

impl GuildState {
    pub fn define_task(&mut self, new: NewTask) -> Result<TaskDefinition, EngineError> {
        trace!("Defining task {}", new.name);
        if self.tasks.contains_key(&new.name) {
            return Err(EngineError::DuplicateTask(new.name));
        }

        let definition = TaskDefinition {
            description: new.description,
            points: new.points,
            required_actions: new.required_actions,
            kind: new.kind,
            bound_channel: new.bound_channel,
            created_by: new.created_by,
            created_at: Utc::now(),
        };
        self.tasks.insert(new.name, definition.clone());
        Ok(definition)
    }

    /// Deletes the task and every user's in-flight attempt at it. Returns how
    /// many active records were dropped.
    pub fn remove_task(&mut self, name: &str) -> Result<usize, EngineError> {
        trace!("Removing task {}", name);
        if self.tasks.remove(name).is_none() {
            return Err(EngineError::TaskNotFound(name.to_string()));
        }

        let mut dropped = 0;
        self.active_tasks.retain(|_, tasks| {
            if tasks.remove(name).is_some() {
                dropped += 1;
            }
            !tasks.is_empty()
        });

        debug!("Task {} removed along with {} active records", name, dropped);
        Ok(dropped)
    }

    pub fn task(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::models::ActiveTaskRecord;

    pub(crate) fn new_task(name: &str, points: u64, required_actions: u32, kind: TaskType) -> NewTask {
        NewTask {
            name: name.to_string(),
            description: format!("{} description", name),
            points,
            required_actions,
            kind,
            bound_channel: None,
            created_by: 1,
        }
    }

    #[test]
    fn test_define_rejects_duplicates() {
        let mut guild = GuildState::default();
        guild
            .define_task(new_task("Greet", 10, 1, TaskType::Manual))
            .unwrap();

        let err = guild
            .define_task(new_task("Greet", 99, 2, TaskType::Manual))
            .unwrap_err();
        assert_eq!(err, EngineError::DuplicateTask("Greet".into()));
        assert_eq!(guild.task("Greet").unwrap().points, 10);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut guild = GuildState::default();
        guild
            .define_task(new_task("Greet", 10, 1, TaskType::Manual))
            .unwrap();
        assert!(guild
            .define_task(new_task("greet", 10, 1, TaskType::Manual))
            .is_ok());
        assert_eq!(guild.tasks.len(), 2);
    }

    #[test]
    fn test_remove_missing_task() {
        let mut guild = GuildState::default();
        assert_eq!(
            guild.remove_task("Nope"),
            Err(EngineError::TaskNotFound("Nope".into()))
        );
    }

    #[test]
    fn test_remove_cascades_to_every_user() {
        let mut guild = GuildState::default();
        let doomed = guild
            .define_task(new_task("Doomed", 10, 3, TaskType::Manual))
            .unwrap();
        let kept = guild
            .define_task(new_task("Kept", 10, 3, TaskType::Manual))
            .unwrap();

        for user in [1, 2, 3] {
            let tasks = guild.active_tasks.entry(user).or_default();
            tasks.insert("Doomed".into(), ActiveTaskRecord::snapshot(&doomed, Utc::now()));
        }
        guild
            .active_tasks
            .entry(2)
            .or_default()
            .insert("Kept".into(), ActiveTaskRecord::snapshot(&kept, Utc::now()));

        assert_eq!(guild.remove_task("Doomed"), Ok(3));
        assert!(guild.active_task(1, "Doomed").is_none());
        assert!(guild.active_task(3, "Doomed").is_none());
        assert!(guild.active_task(2, "Kept").is_some());
        assert!(!guild.active_tasks.contains_key(&1));
    }
}
