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
use serenity::all::{ChannelId as DiscordChannelId, Http, UserId as DiscordUserId};
use tracing::{debug, error, trace};

use std::sync::Arc;

use crate::store::models::{ChannelId, GuildId, UserId};

/// What happened, as far as the people watching are concerned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed {
        task_name: String,
        points_awarded: u64,
        new_total: u64,
    },
    Progress {
        task_name: String,
        completed_actions: u32,
        required_actions: u32,
    },
    NewAchievements {
        names: Vec<&'static str>,
    },
    PointsAdjusted {
        delta: i64,
        reason: String,
        new_total: u64,
    },
}

/// Where the change came from. Commands already answer the user themselves, so
/// direct messages are only sent for changes caused by passive events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Command,
    Event { channel_id: ChannelId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub points_channel: Option<ChannelId>,
    pub trigger: Trigger,
    pub outcome: Outcome,
}

/// Delivers notices to users. Implementations must swallow their own delivery
/// failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: Notice);
}

/// Progress is only worth a message on the first action, every fifth one,
/// halfway, and one short of done.
pub fn should_report_progress(completed_actions: u32, required_actions: u32) -> bool {
    completed_actions == 1
        || completed_actions % 5 == 0
        || completed_actions == required_actions / 2
        || completed_actions + 1 == required_actions
}

pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn direct_message(&self, user_id: UserId, content: &str) -> anyhow::Result<()> {
        DiscordUserId::new(user_id)
            .create_dm_channel(&*self.http)
            .await
            .context("Failed to open DM channel")?
            .say(&*self.http, content)
            .await
            .context("Failed to send DM")?;
        Ok(())
    }

    async fn post(&self, channel_id: ChannelId, content: &str) -> anyhow::Result<()> {
        DiscordChannelId::new(channel_id)
            .say(&*self.http, content)
            .await
            .with_context(|| format!("Failed to send message in channel {}", channel_id))?;
        Ok(())
    }

    async fn announce(&self, notice: &Notice, content: String) {
        let Some(channel_id) = notice.points_channel else {
            return;
        };
        if let Err(e) = self.post(channel_id, &content).await {
            error!("Could not announce in points channel: {:#}", e);
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, notice: Notice) {
        trace!("Delivering {:?}", notice);
        let user = notice.user_id;

        match &notice.outcome {
            Outcome::Completed {
                task_name,
                points_awarded,
                new_total,
            } => {
                if let Trigger::Event { channel_id } = notice.trigger {
                    let content = format!(
                        "\u{2705} Task auto-completed: **{}**\nPoints earned: {} | Total points: {}",
                        task_name, points_awarded, new_total
                    );
                    if let Err(e) = self.direct_message(user, &content).await {
                        debug!("DM to {} failed ({:#}), replying in channel", user, e);
                        let reply = format!("<@{}> {}", user, content);
                        if let Err(e) = self.post(channel_id, &reply).await {
                            error!("Could not deliver completion to {}: {:#}", user, e);
                        }
                    }
                }
                self.announce(
                    &notice,
                    format!(
                        "\u{1f4b0} <@{}> received **{}** points for: completing task: {}\nNew total: {}",
                        user, points_awarded, task_name, new_total
                    ),
                )
                .await;
            }
            Outcome::Progress {
                task_name,
                completed_actions,
                required_actions,
            } => {
                let Trigger::Event { .. } = notice.trigger else {
                    return;
                };
                if !should_report_progress(*completed_actions, *required_actions) {
                    return;
                }
                let content = format!(
                    "\u{1f504} Progress on **{}**: {}/{} actions completed. {} more to go.",
                    task_name,
                    completed_actions,
                    required_actions,
                    required_actions.saturating_sub(*completed_actions)
                );
                // No channel fallback here, it would be spam.
                if let Err(e) = self.direct_message(user, &content).await {
                    debug!("Progress DM to {} failed: {:#}", user, e);
                }
            }
            Outcome::NewAchievements { names } => {
                for name in names {
                    self.announce(
                        &notice,
                        format!(
                            "\u{1f3c6} <@{}> has earned the **{}** achievement!",
                            user, name
                        ),
                    )
                    .await;
                }
            }
            Outcome::PointsAdjusted {
                delta,
                reason,
                new_total,
            } => {
                let verb = if *delta >= 0 { "received" } else { "lost" };
                self.announce(
                    &notice,
                    format!(
                        "\u{1f4b0} <@{}> {} **{}** points for: {}\nNew total: {}",
                        user,
                        verb,
                        delta.unsigned_abs(),
                        reason,
                        new_total
                    ),
                )
                .await;
            }
        }
    }
}
