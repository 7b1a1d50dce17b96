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
pub mod achievements;
pub mod catalog;
pub mod daily;
pub mod ledger;
pub mod progress;
pub mod settings;

use anyhow::Context as _;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::EngineError;
use crate::notify::{Notice, Notifier, Outcome, Trigger};
use crate::store::models::{ChannelId, EventClass, GuildId, GuildState, RoleId, UserId};
use crate::store::persistence::Persistence;
use crate::store::Document;
use crate::utils::time::today_in;
use catalog::NewTask;
use daily::DailyClaim;
use ledger::Adjustment;
use progress::{ActionOutcome, BatchOutcome, StartOutcome};

/// Owns the bot's document and is the only way to change it.
///
/// Every operation takes the document lock, runs to completion, and flushes
/// the whole document before the lock is released, so two triggers racing on
/// the same task can never both pay it out. Notifications are sent after the
/// lock is dropped.
pub struct Engine {
    document: Mutex<Document>,
    persistence: Box<dyn Persistence>,
    notifier: Arc<dyn Notifier>,
    /// Set when the last flush failed. Cleared by the next successful one.
    dirty: AtomicBool,
    timezone: Tz,
}

/// The value an operation produced plus what is needed to announce it.
struct Applied<T> {
    value: T,
    points_channel: Option<ChannelId>,
}

impl Engine {
    /// Loads the saved document, starting empty if nothing was saved before.
    pub async fn open(
        persistence: Box<dyn Persistence>,
        notifier: Arc<dyn Notifier>,
        timezone: Tz,
    ) -> anyhow::Result<Self> {
        let document = persistence
            .load()
            .await
            .context("Failed to load saved data")?;
        match document {
            Some(_) => info!("Data loaded successfully"),
            None => info!("No saved data found, starting fresh"),
        }

        Ok(Self {
            document: Mutex::new(document.unwrap_or_default()),
            persistence,
            notifier,
            dirty: AtomicBool::new(false),
            timezone,
        })
    }

    /// Runs a read-only query against a guild. Guilds that were never written
    /// to are seen with their default state.
    pub async fn read<T>(&self, guild_id: GuildId, query: impl FnOnce(&GuildState) -> T) -> T {
        let document = self.document.lock().await;
        match document.guild(guild_id) {
            Some(guild) => query(guild),
            None => query(&GuildState::default()),
        }
    }

    /// Writes the document if an earlier flush failed.
    pub async fn flush_if_dirty(&self) {
        if !self.dirty.load(Ordering::SeqCst) {
            trace!("Nothing to flush");
            return;
        }
        let document = self.document.lock().await;
        info!("Retrying failed save");
        self.flush(&document).await;
    }

    pub async fn define_task(&self, guild_id: GuildId, task: NewTask) -> Result<(), EngineError> {
        self.mutate(guild_id, |guild| guild.define_task(task).map(|_| ()))
            .await
            .map(|applied| applied.value)
    }

    pub async fn remove_task(&self, guild_id: GuildId, name: &str) -> Result<usize, EngineError> {
        self.mutate(guild_id, |guild| guild.remove_task(name))
            .await
            .map(|applied| applied.value)
    }

    pub async fn start_task(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        task_name: &str,
    ) -> Result<StartOutcome, EngineError> {
        let applied = self
            .mutate(guild_id, |guild| guild.start_task(user_id, task_name))
            .await?;

        if let Some(outcome) = &applied.value.auto_check {
            let notices = action_notices(outcome);
            self.dispatch(guild_id, user_id, applied.points_channel, Trigger::Command, notices);
        }
        Ok(applied.value)
    }

    pub async fn record_action(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        task_name: &str,
    ) -> Result<ActionOutcome, EngineError> {
        let applied = self
            .mutate(guild_id, |guild| guild.record_action(user_id, task_name))
            .await?;

        let notices = action_notices(&applied.value);
        self.dispatch(guild_id, user_id, applied.points_channel, Trigger::Command, notices);
        Ok(applied.value)
    }

    pub async fn complete_all_active(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<BatchOutcome, EngineError> {
        let applied = self
            .mutate(guild_id, |guild| guild.complete_all_active(user_id))
            .await?;
        let batch = &applied.value;

        if !batch.orphaned.is_empty() {
            warn!(
                "Discarded orphaned active tasks {:?} for user {} in guild {}",
                batch.orphaned, user_id, guild_id
            );
        }

        let mut notices = Vec::new();
        if batch.points_awarded > 0 {
            notices.push(Outcome::PointsAdjusted {
                delta: i64::try_from(batch.points_awarded).unwrap_or(i64::MAX),
                reason: format!("completing {} tasks", batch.completed.len()),
                new_total: batch.new_total,
            });
        }
        if !batch.achievements.is_empty() {
            notices.push(Outcome::NewAchievements {
                names: batch.achievements.clone(),
            });
        }
        self.dispatch(guild_id, user_id, applied.points_channel, Trigger::Command, notices);
        Ok(applied.value)
    }

    /// Feeds a passive platform event into the progress engine. Events that
    /// match no task change nothing and are not saved.
    pub async fn auto_advance_on_event(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
        event: EventClass,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        let (result, points_channel) = {
            let mut document = self.document.lock().await;
            let guild = document.ensure_guild(guild_id);
            let result = guild.auto_advance_on_event(user_id, channel_id, event);
            let points_channel = guild.settings.points_channel;

            let changed = match &result {
                Ok(outcome) => outcome.is_some(),
                Err(e) => e.left_changes(),
            };
            if changed {
                self.flush(&document).await;
            }
            (result, points_channel)
        };

        let outcome = result?;
        if let Some(outcome) = &outcome {
            let notices = action_notices(outcome);
            self.dispatch(
                guild_id,
                user_id,
                points_channel,
                Trigger::Event { channel_id },
                notices,
            );
        }
        Ok(outcome)
    }

    /// Whether an event in `channel_id` would advance one of the user's tasks.
    pub async fn has_passive_match(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        channel_id: ChannelId,
        event: EventClass,
    ) -> bool {
        self.read(guild_id, |guild| {
            guild.passive_match(user_id, channel_id, event).is_some()
        })
        .await
    }

    pub async fn claim_daily(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<DailyClaim, EngineError> {
        let today = today_in(self.timezone);
        let applied = self
            .mutate(guild_id, |guild| {
                guild.claim_daily(user_id, today, &mut rand::thread_rng())
            })
            .await?;
        let claim = &applied.value;

        let mut notices = vec![Outcome::PointsAdjusted {
            delta: i64::try_from(claim.bonus).unwrap_or(i64::MAX),
            reason: "daily quote bonus".to_string(),
            new_total: claim.new_total,
        }];
        if !claim.achievements.is_empty() {
            notices.push(Outcome::NewAchievements {
                names: claim.achievements.clone(),
            });
        }
        self.dispatch(guild_id, user_id, applied.points_channel, Trigger::Command, notices);
        Ok(applied.value)
    }

    pub async fn add_points(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        amount: u64,
        reason: &str,
    ) -> Result<Adjustment, EngineError> {
        self.adjust(guild_id, reason, |guild| Ok(guild.add_points(user_id, amount)))
            .await
    }

    pub async fn remove_points(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        amount: u64,
        reason: &str,
    ) -> Result<Adjustment, EngineError> {
        self.adjust(guild_id, reason, |guild| {
            Ok(guild.remove_points(user_id, amount))
        })
        .await
    }

    pub async fn reset_leaderboard(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.mutate(guild_id, |guild| {
            guild.reset_leaderboard();
            Ok(())
        })
        .await
        .map(|applied| applied.value)
    }

    pub async fn add_staff_role(&self, guild_id: GuildId, role: RoleId) -> Result<(), EngineError> {
        self.mutate(guild_id, |guild| guild.add_staff_role(role))
            .await
            .map(|applied| applied.value)
    }

    pub async fn add_admin_role(&self, guild_id: GuildId, role: RoleId) -> Result<(), EngineError> {
        self.mutate(guild_id, |guild| guild.add_admin_role(role))
            .await
            .map(|applied| applied.value)
    }

    pub async fn set_points_channel(
        &self,
        guild_id: GuildId,
        channel: ChannelId,
    ) -> Result<(), EngineError> {
        self.mutate(guild_id, |guild| {
            guild.set_points_channel(channel);
            Ok(())
        })
        .await
        .map(|applied| applied.value)
    }

    pub async fn add_quote(&self, guild_id: GuildId, quote: String) -> Result<usize, EngineError> {
        self.mutate(guild_id, |guild| Ok(guild.add_quote(quote)))
            .await
            .map(|applied| applied.value)
    }

    pub async fn remove_quote(&self, guild_id: GuildId, index: usize) -> Result<String, EngineError> {
        self.mutate(guild_id, |guild| guild.remove_quote(index))
            .await
            .map(|applied| applied.value)
    }

    async fn adjust(
        &self,
        guild_id: GuildId,
        reason: &str,
        op: impl FnOnce(&mut GuildState) -> Result<Adjustment, EngineError>,
    ) -> Result<Adjustment, EngineError> {
        let applied = self.mutate(guild_id, op).await?;
        let adjustment = &applied.value;

        // Removing from an empty balance changes nothing worth announcing.
        let mut notices = Vec::new();
        if adjustment.delta != 0 {
            notices.push(Outcome::PointsAdjusted {
                delta: adjustment.delta,
                reason: reason.to_string(),
                new_total: adjustment.new_total,
            });
        }
        if !adjustment.achievements.is_empty() {
            notices.push(Outcome::NewAchievements {
                names: adjustment.achievements.clone(),
            });
        }
        self.dispatch(
            guild_id,
            adjustment.user_id,
            applied.points_channel,
            Trigger::Command,
            notices,
        );
        Ok(applied.value)
    }

    /// Applies `op` to the guild under the document lock and flushes if anything
    /// changed.
    async fn mutate<T>(
        &self,
        guild_id: GuildId,
        op: impl FnOnce(&mut GuildState) -> Result<T, EngineError>,
    ) -> Result<Applied<T>, EngineError> {
        let mut document = self.document.lock().await;
        let guild = document.ensure_guild(guild_id);
        let result = op(&mut *guild);
        let points_channel = guild.settings.points_channel;

        match &result {
            Ok(_) => self.flush(&document).await,
            Err(e) if e.left_changes() => {
                warn!("Consistency problem in guild {}: {}", guild_id, e);
                self.flush(&document).await;
            }
            Err(e) => debug!("Rejected operation in guild {}: {}", guild_id, e),
        }

        result.map(|value| Applied {
            value,
            points_channel,
        })
    }

    /// A failed save is logged and left for the next flush to retry; the
    /// in-memory state stays ahead of the file until then.
    async fn flush(&self, document: &Document) {
        match self.persistence.save(document).await {
            Ok(()) => self.dirty.store(false, Ordering::SeqCst),
            Err(e) => {
                error!("Error saving data: {:#}", e);
                self.dirty.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Hands the notices to the notifier on a separate task, in order, so
    /// slow deliveries never hold up the caller.
    fn dispatch(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        points_channel: Option<ChannelId>,
        trigger: Trigger,
        outcomes: Vec<Outcome>,
    ) {
        if outcomes.is_empty() {
            return;
        }
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            for outcome in outcomes {
                notifier
                    .notify(Notice {
                        guild_id,
                        user_id,
                        points_channel,
                        trigger,
                        outcome,
                    })
                    .await;
            }
        });
    }
}

fn action_notices(outcome: &ActionOutcome) -> Vec<Outcome> {
    match outcome {
        ActionOutcome::InProgress(progress) => vec![Outcome::Progress {
            task_name: progress.task_name.clone(),
            completed_actions: progress.completed_actions,
            required_actions: progress.required_actions,
        }],
        ActionOutcome::Completed(completion) => {
            let mut notices = vec![Outcome::Completed {
                task_name: completion.task_name.clone(),
                points_awarded: completion.points_awarded,
                new_total: completion.new_total,
            }];
            if !completion.achievements.is_empty() {
                notices.push(Outcome::NewAchievements {
                    names: completion.achievements.clone(),
                });
            }
            notices
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::tests::new_task;
    use crate::store::models::TaskType;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    const GUILD: GuildId = 100;
    const USER: UserId = 200;

    #[derive(Default)]
    struct MemoryStore {
        saved: std::sync::Mutex<Option<Document>>,
        saves: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Persistence for Arc<MemoryStore> {
        async fn load(&self) -> anyhow::Result<Option<Document>> {
            Ok(self.saved.lock().unwrap().clone())
        }

        async fn save(&self, document: &Document) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.saved.lock().unwrap() = Some(document.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: std::sync::Mutex<Vec<Notice>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    async fn engine() -> (Engine, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Engine::open(Box::new(store.clone()), notifier.clone(), Tz::UTC)
            .await
            .unwrap();
        (engine, store, notifier)
    }

    /// Lets the spawned delivery tasks run to completion.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn saved_user_points(store: &MemoryStore) -> u64 {
        let mut saved = store.saved.lock().unwrap().clone().unwrap();
        saved.ensure_user(GUILD, USER).points
    }

    #[tokio::test]
    async fn test_completion_is_saved_and_announced() {
        let (engine, store, notifier) = engine().await;
        engine
            .define_task(GUILD, new_task("Welcome", 50, 2, TaskType::Manual))
            .await
            .unwrap();
        engine.set_points_channel(GUILD, 9).await.unwrap();
        engine.start_task(GUILD, USER, "Welcome").await.unwrap();

        engine.record_action(GUILD, USER, "Welcome").await.unwrap();
        settle().await;
        let outcome = engine.record_action(GUILD, USER, "Welcome").await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Completed(_)));
        assert_eq!(saved_user_points(&store), 50);
        settle().await;

        let notices = notifier.notices.lock().unwrap();
        let outcomes: Vec<&Outcome> = notices.iter().map(|n| &n.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                &Outcome::Progress {
                    task_name: "Welcome".into(),
                    completed_actions: 1,
                    required_actions: 2,
                },
                &Outcome::Completed {
                    task_name: "Welcome".into(),
                    points_awarded: 50,
                    new_total: 50,
                },
                &Outcome::NewAchievements {
                    names: vec!["First Steps"],
                },
            ]
        );
        assert!(notices.iter().all(|n| n.points_channel == Some(9)));
        assert!(notices.iter().all(|n| n.trigger == Trigger::Command));
    }

    #[tokio::test]
    async fn test_rejected_operations_do_not_save() {
        let (engine, store, _) = engine().await;
        let err = engine.start_task(GUILD, USER, "Missing").await.unwrap_err();
        assert_eq!(err, EngineError::TaskNotFound("Missing".into()));
        assert_eq!(store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unmatched_event_does_not_save() {
        let (engine, store, notifier) = engine().await;
        engine
            .define_task(GUILD, new_task("Chat", 5, 3, TaskType::SendMessage))
            .await
            .unwrap();
        let saves = store.saves.load(Ordering::SeqCst);

        let outcome = engine
            .auto_advance_on_event(GUILD, USER, 1234, EventClass::Message)
            .await
            .unwrap();
        assert_eq!(outcome, None);
        assert_eq!(store.saves.load(Ordering::SeqCst), saves);
        settle().await;
        assert!(notifier.notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_matched_event_notifies_with_event_trigger() {
        let (engine, _, notifier) = engine().await;
        let mut task = new_task("Chat", 5, 3, TaskType::SendMessage);
        task.bound_channel = Some(55);
        engine.define_task(GUILD, task).await.unwrap();
        engine.start_task(GUILD, USER, "Chat").await.unwrap();

        assert!(engine.has_passive_match(GUILD, USER, 55, EventClass::Message).await);
        assert!(!engine.has_passive_match(GUILD, USER, 56, EventClass::Message).await);

        let outcome = engine
            .auto_advance_on_event(GUILD, USER, 55, EventClass::Message)
            .await
            .unwrap();
        assert!(matches!(outcome, Some(ActionOutcome::InProgress(_))));
        settle().await;

        let notices = notifier.notices.lock().unwrap();
        let last = notices.last().unwrap();
        assert_eq!(last.trigger, Trigger::Event { channel_id: 55 });
        assert_eq!(
            last.outcome,
            Outcome::Progress {
                task_name: "Chat".into(),
                completed_actions: 2,
                required_actions: 3,
            }
        );
    }

    struct SlowNotifier;

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn notify(&self, _notice: Notice) {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        }
    }

    #[tokio::test]
    async fn test_slow_delivery_does_not_hold_up_operations() {
        let store = Arc::new(MemoryStore::default());
        let engine = Engine::open(Box::new(store.clone()), Arc::new(SlowNotifier), Tz::UTC)
            .await
            .unwrap();
        engine
            .define_task(GUILD, new_task("Quick", 5, 1, TaskType::Manual))
            .await
            .unwrap();
        engine.start_task(GUILD, USER, "Quick").await.unwrap();

        let started = std::time::Instant::now();
        let outcome = engine.record_action(GUILD, USER, "Quick").await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Completed(_)));
        engine.add_points(GUILD, USER, 10, "testing").await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(saved_user_points(&store), 15);
    }

    #[tokio::test]
    async fn test_empty_removal_is_not_announced() {
        let (engine, _, notifier) = engine().await;
        let adjustment = engine
            .remove_points(GUILD, USER, 50, "cleanup")
            .await
            .unwrap();
        assert_eq!(adjustment.delta, 0);
        assert_eq!(adjustment.new_total, 0);
        settle().await;
        assert!(notifier.notices.lock().unwrap().is_empty());

        engine.add_points(GUILD, USER, 20, "bonus").await.unwrap();
        engine.remove_points(GUILD, USER, 50, "cleanup").await.unwrap();
        settle().await;
        let notices = notifier.notices.lock().unwrap();
        let outcomes: Vec<&Outcome> = notices.iter().map(|n| &n.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                &Outcome::PointsAdjusted {
                    delta: 20,
                    reason: "bonus".into(),
                    new_total: 20,
                },
                &Outcome::PointsAdjusted {
                    delta: -20,
                    reason: "cleanup".into(),
                    new_total: 0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_vanished_task_record_is_dropped_and_saved() {
        let (engine, store, _) = engine().await;
        engine
            .define_task(GUILD, new_task("Gone", 5, 3, TaskType::Manual))
            .await
            .unwrap();
        engine.start_task(GUILD, USER, "Gone").await.unwrap();
        // Remove the definition without the cascade.
        engine
            .document
            .lock()
            .await
            .ensure_guild(GUILD)
            .tasks
            .remove("Gone");
        let saves = store.saves.load(Ordering::SeqCst);

        let err = engine.record_action(GUILD, USER, "Gone").await.unwrap_err();
        assert_eq!(err, EngineError::TaskVanished("Gone".into()));
        assert_eq!(store.saves.load(Ordering::SeqCst), saves + 1);

        let saved = store.saved.lock().unwrap().clone().unwrap();
        let guild = saved.guild(GUILD).unwrap();
        assert!(guild.active_task(USER, "Gone").is_none());
        assert!(guild.active_tasks.is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_is_retried() {
        let (engine, store, _) = engine().await;
        store.fail.store(true, Ordering::SeqCst);

        let adjustment = engine.add_points(GUILD, USER, 40, "testing").await.unwrap();
        assert_eq!(adjustment.new_total, 40);
        assert!(store.saved.lock().unwrap().is_none());

        store.fail.store(false, Ordering::SeqCst);
        engine.flush_if_dirty().await;
        assert_eq!(saved_user_points(&store), 40);

        let saves = store.saves.load(Ordering::SeqCst);
        engine.flush_if_dirty().await;
        assert_eq!(store.saves.load(Ordering::SeqCst), saves);
    }

    #[tokio::test]
    async fn test_reload_restores_state() {
        let (engine, store, _) = engine().await;
        engine.add_points(GUILD, USER, 15, "testing").await.unwrap();
        drop(engine);

        let reopened = Engine::open(
            Box::new(store.clone()),
            Arc::new(RecordingNotifier::default()),
            Tz::UTC,
        )
        .await
        .unwrap();
        let points = reopened
            .read(GUILD, |guild| guild.profile(USER).user.points)
            .await;
        assert_eq!(points, 15);
    }

    #[tokio::test]
    async fn test_concurrent_actions_complete_once() {
        let (engine, _, _) = engine().await;
        let engine = Arc::new(engine);
        engine
            .define_task(GUILD, new_task("Race", 10, 3, TaskType::Manual))
            .await
            .unwrap();
        engine.start_task(GUILD, USER, "Race").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.record_action(GUILD, USER, "Race").await
            }));
        }

        let mut completed = 0;
        for handle in handles {
            if let Ok(ActionOutcome::Completed(_)) = handle.await.unwrap() {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);
        let user = engine.read(GUILD, |guild| guild.profile(USER).user).await;
        assert_eq!(user.points, 10);
        assert_eq!(user.tasks_completed, 1);
    }
}
