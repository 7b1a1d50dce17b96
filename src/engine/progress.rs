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
//! The task state machine. A (user, task) pair is either not started, in
//! progress (an [`ActiveTaskRecord`] exists), or completed, at which point the
//! record is deleted and the reward is paid out exactly once.
use chrono::Utc;
use tracing::{debug, trace, warn};

use super::achievements::apply_new_achievements;
use crate::error::EngineError;
use crate::store::models::{
    ActiveTaskRecord, ChannelId, EventClass, GuildState, TaskDefinition, UserId,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub task_name: String,
    pub completed_actions: u32,
    pub required_actions: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub task_name: String,
    pub points_awarded: u64,
    pub new_total: u64,
    pub tasks_completed: u64,
    pub achievements: Vec<&'static str>,
}

/// What a single recorded action did to a task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed(Completion),
    InProgress(Progress),
}

#[derive(Clone, Debug, PartialEq)]
pub struct StartOutcome {
    pub task: TaskDefinition,
    pub record: ActiveTaskRecord,
    /// Set for task types that count starting the task as their first action.
    pub auto_check: Option<ActionOutcome>,
}

/// Result of advancing every active task at once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Task names paired with the points each one paid out.
    pub completed: Vec<(String, u64)>,
    pub in_progress: Vec<Progress>,
    /// Records that referenced a deleted task and were discarded.
    pub orphaned: Vec<String>,
    pub points_awarded: u64,
    pub new_total: u64,
    pub achievements: Vec<&'static str>,
}

/// A single counter step, before achievements are looked at.
enum Step {
    Crossed { points: u64 },
    Advanced(Progress),
}

impl GuildState {
    pub fn start_task(
        &mut self,
        user_id: UserId,
        task_name: &str,
    ) -> Result<StartOutcome, EngineError> {
        trace!("User {} starting task {}", user_id, task_name);
        let task = self
            .tasks
            .get(task_name)
            .cloned()
            .ok_or_else(|| EngineError::TaskNotFound(task_name.to_string()))?;

        if self.active_task(user_id, task_name).is_some() {
            return Err(EngineError::AlreadyActive(task_name.to_string()));
        }

        let record = ActiveTaskRecord::snapshot(&task, Utc::now());
        self.active_tasks
            .entry(user_id)
            .or_default()
            .insert(task_name.to_string(), record.clone());
        self.ensure_user(user_id).total_tasks_started += 1;

        let auto_check = if task.kind.capabilities().checks_on_start {
            debug!("Task {} is {}, checking it immediately", task_name, task.kind.as_str());
            Some(self.record_action(user_id, task_name)?)
        } else {
            None
        };

        Ok(StartOutcome {
            task,
            record,
            auto_check,
        })
    }

    /// Counts one action towards the task and pays it out if that was the last
    /// one needed.
    pub fn record_action(
        &mut self,
        user_id: UserId,
        task_name: &str,
    ) -> Result<ActionOutcome, EngineError> {
        match self.step(user_id, task_name)? {
            Step::Advanced(progress) => Ok(ActionOutcome::InProgress(progress)),
            Step::Crossed { points } => {
                let user = self.ensure_user(user_id);
                let achievements = apply_new_achievements(user);
                Ok(ActionOutcome::Completed(Completion {
                    task_name: task_name.to_string(),
                    points_awarded: points,
                    new_total: user.points,
                    tasks_completed: user.tasks_completed,
                    achievements,
                }))
            }
        }
    }

    /// Counts one action towards every active task of the user. Achievements are
    /// evaluated once, after all tasks have been advanced.
    pub fn complete_all_active(&mut self, user_id: UserId) -> Result<BatchOutcome, EngineError> {
        trace!("Advancing every active task of user {}", user_id);
        let names: Vec<String> = self
            .active_tasks
            .get(&user_id)
            .map(|tasks| tasks.keys().cloned().collect())
            .unwrap_or_default();

        if names.is_empty() {
            return Err(EngineError::NothingActive);
        }

        let mut outcome = BatchOutcome::default();
        for name in names {
            match self.step(user_id, &name) {
                Ok(Step::Crossed { points }) => {
                    outcome.points_awarded += points;
                    outcome.completed.push((name, points));
                }
                Ok(Step::Advanced(progress)) => outcome.in_progress.push(progress),
                Err(EngineError::TaskVanished(_)) => outcome.orphaned.push(name),
                Err(e) => return Err(e),
            }
        }

        let user = self.ensure_user(user_id);
        outcome.achievements = apply_new_achievements(user);
        outcome.new_total = user.points;
        Ok(outcome)
    }

    /// Advances at most one task in response to a platform event: the first of
    /// the user's active tasks whose type reacts to `event` and which is bound to
    /// `channel_id`. Returns `None` and leaves the state alone when nothing
    /// matches.
    pub fn auto_advance_on_event(
        &mut self,
        user_id: UserId,
        channel_id: ChannelId,
        event: EventClass,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        match self.passive_match(user_id, channel_id, event) {
            Some(task_name) => self.record_action(user_id, &task_name).map(Some),
            None => Ok(None),
        }
    }

    pub fn passive_match(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
        event: EventClass,
    ) -> Option<String> {
        let active = self.active_tasks.get(&user_id)?;
        active
            .keys()
            .find(|name| {
                self.tasks.get(name.as_str()).is_some_and(|task| {
                    task.kind.capabilities().passive_trigger == Some(event)
                        && task.bound_channel == Some(channel_id)
                })
            })
            .cloned()
    }

    /// The user's active tasks alongside their definitions, ordered by name.
    pub fn active_tasks_of(
        &self,
        user_id: UserId,
    ) -> Vec<(&str, &ActiveTaskRecord, Option<&TaskDefinition>)> {
        self.active_tasks
            .get(&user_id)
            .map(|tasks| {
                tasks
                    .iter()
                    .map(|(name, record)| (name.as_str(), record, self.tasks.get(name)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn step(&mut self, user_id: UserId, task_name: &str) -> Result<Step, EngineError> {
        if self.active_task(user_id, task_name).is_none() {
            return Err(EngineError::NoActiveTask(task_name.to_string()));
        }

        if !self.tasks.contains_key(task_name) {
            warn!(
                "User {} had an active record for missing task {}, discarding it",
                user_id, task_name
            );
            self.remove_active(user_id, task_name);
            return Err(EngineError::TaskVanished(task_name.to_string()));
        }

        let Some(record) = self
            .active_tasks
            .get_mut(&user_id)
            .and_then(|tasks| tasks.get_mut(task_name))
        else {
            return Err(EngineError::NoActiveTask(task_name.to_string()));
        };

        record.completed_actions += 1;
        debug!(
            "User {} progress on {}: {}/{}",
            user_id, task_name, record.completed_actions, record.required_actions
        );

        if record.completed_actions < record.required_actions {
            return Ok(Step::Advanced(Progress {
                task_name: task_name.to_string(),
                completed_actions: record.completed_actions,
                required_actions: record.required_actions,
            }));
        }

        let points = record.points;
        self.remove_active(user_id, task_name);
        let user = self.ensure_user(user_id);
        user.credit(points);
        user.tasks_completed += 1;
        debug!("User {} completed {} for {} points", user_id, task_name, points);

        Ok(Step::Crossed { points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::tests::new_task;
    use crate::store::models::TaskType;

    const USER: UserId = 42;

    fn guild_with(tasks: &[(&str, u64, u32, TaskType)]) -> GuildState {
        let mut guild = GuildState::default();
        for (name, points, required, kind) in tasks {
            guild
                .define_task(new_task(name, *points, *required, *kind))
                .unwrap();
        }
        guild
    }

    fn bind(guild: &mut GuildState, task: &str, channel: ChannelId) {
        guild.tasks.get_mut(task).unwrap().bound_channel = Some(channel);
    }

    #[test]
    fn test_welcome_new_members_scenario() {
        let mut guild = guild_with(&[("Welcome New Members", 50, 3, TaskType::Manual)]);

        let started = guild.start_task(USER, "Welcome New Members").unwrap();
        assert_eq!(started.auto_check, None);
        assert_eq!(
            guild
                .active_task(USER, "Welcome New Members")
                .unwrap()
                .completed_actions,
            0
        );

        for expected in 1..=2 {
            let outcome = guild.record_action(USER, "Welcome New Members").unwrap();
            assert_eq!(
                outcome,
                ActionOutcome::InProgress(Progress {
                    task_name: "Welcome New Members".into(),
                    completed_actions: expected,
                    required_actions: 3,
                })
            );
        }

        let ActionOutcome::Completed(completion) =
            guild.record_action(USER, "Welcome New Members").unwrap()
        else {
            panic!("third action should complete the task");
        };
        assert_eq!(completion.points_awarded, 50);
        assert_eq!(completion.new_total, 50);
        assert_eq!(completion.achievements, vec!["First Steps"]);

        let user = &guild.users[&USER];
        assert_eq!(user.points, 50);
        assert_eq!(user.tasks_completed, 1);
        assert_eq!(user.total_tasks_started, 1);
        assert!(guild.active_task(USER, "Welcome New Members").is_none());
    }

    #[test]
    fn test_n_actions_complete_exactly_once() {
        for required in [1, 2, 7, 50] {
            let mut guild = guild_with(&[("Grind", 5, required, TaskType::Manual)]);
            guild.start_task(USER, "Grind").unwrap();

            let mut completions = 0;
            for action in 1..=required {
                match guild.record_action(USER, "Grind").unwrap() {
                    ActionOutcome::Completed(_) => {
                        assert_eq!(action, required, "completed early");
                        completions += 1;
                    }
                    ActionOutcome::InProgress(progress) => {
                        assert!(progress.completed_actions < progress.required_actions);
                        let at_rest = guild.active_task(USER, "Grind").unwrap();
                        assert!(at_rest.completed_actions < at_rest.required_actions);
                    }
                }
            }

            assert_eq!(completions, 1);
            assert_eq!(guild.users[&USER].tasks_completed, 1);
            assert_eq!(
                guild.record_action(USER, "Grind"),
                Err(EngineError::NoActiveTask("Grind".into()))
            );
        }
    }

    #[test]
    fn test_start_rejects_unknown_and_duplicate() {
        let mut guild = guild_with(&[("Patrol", 10, 2, TaskType::Manual)]);
        assert_eq!(
            guild.start_task(USER, "Nope").unwrap_err(),
            EngineError::TaskNotFound("Nope".into())
        );

        guild.start_task(USER, "Patrol").unwrap();
        assert_eq!(
            guild.start_task(USER, "Patrol").unwrap_err(),
            EngineError::AlreadyActive("Patrol".into())
        );
        assert_eq!(guild.users[&USER].total_tasks_started, 1);

        guild.record_action(USER, "Patrol").unwrap();
        guild.record_action(USER, "Patrol").unwrap();
        assert!(guild.start_task(USER, "Patrol").is_ok());
        assert_eq!(guild.users[&USER].total_tasks_started, 2);
    }

    #[test]
    fn test_points_are_snapshotted_at_start() {
        let mut guild = guild_with(&[("Report", 10, 1, TaskType::Manual)]);
        guild.start_task(USER, "Report").unwrap();
        guild.tasks.get_mut("Report").unwrap().points = 1000;

        let ActionOutcome::Completed(completion) = guild.record_action(USER, "Report").unwrap()
        else {
            panic!("single action task should complete");
        };
        assert_eq!(completion.points_awarded, 10);
    }

    #[test]
    fn test_non_manual_start_counts_one_action() {
        let mut guild = guild_with(&[
            ("Snap", 15, 1, TaskType::UploadImage),
            ("Chat", 5, 3, TaskType::SendMessage),
        ]);

        let snap = guild.start_task(USER, "Snap").unwrap();
        assert!(matches!(snap.auto_check, Some(ActionOutcome::Completed(_))));
        assert!(guild.active_task(USER, "Snap").is_none());
        assert_eq!(guild.users[&USER].points, 15);

        let chat = guild.start_task(USER, "Chat").unwrap();
        assert_eq!(
            chat.auto_check,
            Some(ActionOutcome::InProgress(Progress {
                task_name: "Chat".into(),
                completed_actions: 1,
                required_actions: 3,
            }))
        );
    }

    #[test]
    fn test_vanished_definition_drops_the_record() {
        let mut guild = guild_with(&[("Ghost", 10, 3, TaskType::Manual)]);
        guild.start_task(USER, "Ghost").unwrap();
        guild.tasks.remove("Ghost");

        assert_eq!(
            guild.record_action(USER, "Ghost"),
            Err(EngineError::TaskVanished("Ghost".into()))
        );
        assert!(guild.active_task(USER, "Ghost").is_none());
        assert_eq!(guild.users[&USER].points, 0);
    }

    #[test]
    fn test_complete_all_partitions_results() {
        let mut guild = guild_with(&[
            ("Alpha", 30, 1, TaskType::Manual),
            ("Beta", 20, 1, TaskType::Manual),
            ("Gamma", 10, 4, TaskType::Manual),
            ("Ghost", 99, 1, TaskType::Manual),
        ]);
        for name in ["Alpha", "Beta", "Gamma", "Ghost"] {
            guild.start_task(USER, name).unwrap();
        }
        guild.tasks.remove("Ghost");

        let outcome = guild.complete_all_active(USER).unwrap();
        assert_eq!(
            outcome.completed,
            vec![("Alpha".to_string(), 30), ("Beta".to_string(), 20)]
        );
        assert_eq!(
            outcome.in_progress,
            vec![Progress {
                task_name: "Gamma".into(),
                completed_actions: 1,
                required_actions: 4,
            }]
        );
        assert_eq!(outcome.orphaned, vec!["Ghost".to_string()]);
        assert_eq!(outcome.points_awarded, 50);
        assert_eq!(outcome.new_total, 50);
        assert_eq!(outcome.achievements, vec!["First Steps"]);

        let user = &guild.users[&USER];
        assert_eq!(user.tasks_completed, 2);
        assert_eq!(guild.active_tasks_of(USER).len(), 1);
    }

    #[test]
    fn test_complete_all_without_tasks() {
        let mut guild = GuildState::default();
        assert_eq!(
            guild.complete_all_active(USER),
            Err(EngineError::NothingActive)
        );
    }

    #[test]
    fn test_fifth_completion_unlocks_getting_started() {
        let mut guild = guild_with(&[("Quick", 1, 1, TaskType::Manual)]);
        {
            let user = guild.ensure_user(USER);
            user.tasks_completed = 4;
            user.achievements.push("First Steps".into());
        }

        guild.start_task(USER, "Quick").unwrap();
        let ActionOutcome::Completed(completion) = guild.record_action(USER, "Quick").unwrap()
        else {
            panic!("single action task should complete");
        };
        assert_eq!(completion.tasks_completed, 5);
        assert_eq!(completion.achievements, vec!["Getting Started"]);
    }

    #[test]
    fn test_passive_event_advances_first_match_only() {
        let mut guild = guild_with(&[
            ("Chat A", 5, 5, TaskType::SendMessage),
            ("Chat B", 5, 5, TaskType::SendMessage),
        ]);
        bind(&mut guild, "Chat A", 77);
        bind(&mut guild, "Chat B", 77);
        guild.start_task(USER, "Chat A").unwrap();
        guild.start_task(USER, "Chat B").unwrap();

        let outcome = guild
            .auto_advance_on_event(USER, 77, EventClass::Message)
            .unwrap();
        assert_eq!(
            outcome,
            Some(ActionOutcome::InProgress(Progress {
                task_name: "Chat A".into(),
                completed_actions: 2,
                required_actions: 5,
            }))
        );
        assert_eq!(guild.active_task(USER, "Chat B").unwrap().completed_actions, 1);
    }

    #[test]
    fn test_passive_event_ignores_unrelated_tasks() {
        let mut guild = guild_with(&[
            ("Chat", 5, 5, TaskType::SendMessage),
            ("Look", 5, 5, TaskType::CheckChannel),
            ("Manual", 5, 5, TaskType::Manual),
        ]);
        bind(&mut guild, "Chat", 1);
        bind(&mut guild, "Look", 2);
        bind(&mut guild, "Manual", 2);
        for name in ["Chat", "Look", "Manual"] {
            guild.start_task(USER, name).unwrap();
        }
        let before = guild.clone();

        assert_eq!(
            guild.auto_advance_on_event(USER, 2, EventClass::Message),
            Ok(None)
        );
        assert_eq!(
            guild.auto_advance_on_event(7, 1, EventClass::Message),
            Ok(None)
        );
        assert_eq!(guild, before);
    }

    #[test]
    fn test_passive_event_can_complete() {
        let mut guild = guild_with(&[("Say hi", 25, 2, TaskType::SendMessage)]);
        bind(&mut guild, "Say hi", 9);
        guild.start_task(USER, "Say hi").unwrap();

        let outcome = guild
            .auto_advance_on_event(USER, 9, EventClass::Message)
            .unwrap();
        assert!(matches!(outcome, Some(ActionOutcome::Completed(_))));
        assert_eq!(guild.users[&USER].points, 25);
        assert_eq!(
            guild.auto_advance_on_event(USER, 9, EventClass::Message),
            Ok(None)
        );
    }
}
