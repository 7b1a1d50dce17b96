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
mod admin;
mod staff;

use anyhow::Context as _;
use poise::CreateReply;
use tracing::{debug, error, trace};

use crate::engine::progress::ActionOutcome;
use crate::error::EngineError;
use crate::store::models::{GuildId, RoleId};
use crate::{Context, Data, Error};

/// Discord rejects messages longer than this.
const MESSAGE_LIMIT: usize = 2000;

/// Every function that is defined *should* be added to the
/// returned vector in get_commands to ensure it is registered (available for the user)
/// when the bot goes online.
pub fn get_commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        staff::starttask(),
        staff::completetask(),
        staff::mytasks(),
        staff::leaderboard(),
        staff::topten(),
        staff::dailyquote(),
        staff::profile(),
        staff::achievements(),
        staff::taskinfo(),
        staff::help(),
        admin::addtask(),
        admin::removetask(),
        admin::addpoints(),
        admin::removepoints(),
        admin::resetleaderboard(),
        admin::setstaffrole(),
        admin::setadminrole(),
        admin::viewtasks(),
        admin::serverstats(),
        admin::setpointschannel(),
        admin::adddailyquote(),
        admin::removedailyquote(),
        admin::viewdailyquotes(),
    ]
}

/// Unexpected command failures are logged and answered with a generic reply.
pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!(
                "Command {} failed: {:#}",
                ctx.command().qualified_name,
                error
            );
            let reply = CreateReply::default()
                .content("\u{274c} An error occurred while processing your command.")
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Could not send error reply: {}", e);
            }
        }
        // The check has already told the user why.
        poise::FrameworkError::CommandCheckFailed { error: None, .. } => {}
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

pub(crate) fn guild_id(ctx: Context<'_>) -> anyhow::Result<GuildId> {
    ctx.guild_id()
        .map(|id| id.get())
        .context("Command was used outside of a server")
}

/// The invoking member's roles and whether they hold Administrator.
async fn member_capabilities(ctx: Context<'_>) -> (Vec<RoleId>, bool) {
    let Some(member) = ctx.author_member().await else {
        return (Vec::new(), false);
    };
    let roles = member.roles.iter().map(|role| role.get()).collect();
    let administrator = member
        .permissions
        .is_some_and(|permissions| permissions.administrator());
    (roles, administrator)
}

async fn is_staff(ctx: Context<'_>) -> Result<bool, Error> {
    trace!("Checking staff permissions for {}", ctx.author().id);
    let guild_id = guild_id(ctx)?;
    let (roles, administrator) = member_capabilities(ctx).await;
    let allowed = ctx
        .data()
        .engine
        .read(guild_id, |guild| guild.settings.is_staff(&roles, administrator))
        .await;

    if !allowed {
        deny(ctx, "You need to be a staff member to use this command!").await?;
    }
    Ok(allowed)
}

async fn is_admin(ctx: Context<'_>) -> Result<bool, Error> {
    trace!("Checking admin permissions for {}", ctx.author().id);
    let guild_id = guild_id(ctx)?;
    let (roles, administrator) = member_capabilities(ctx).await;
    let allowed = ctx
        .data()
        .engine
        .read(guild_id, |guild| guild.settings.is_admin(&roles, administrator))
        .await;

    if !allowed {
        deny(ctx, "You need admin permissions to use this command!").await?;
    }
    Ok(allowed)
}

async fn deny(ctx: Context<'_>, reason: &str) -> Result<(), Error> {
    let reply = CreateReply::default()
        .content(format!("\u{274c} {}", reason))
        .ephemeral(true);
    ctx.send(reply).await?;
    Ok(())
}

/// Tells the user why the engine refused. Only they see it.
async fn reject(ctx: Context<'_>, error: EngineError) -> Result<(), Error> {
    debug!(
        "Command {} rejected: {:?}",
        ctx.command().qualified_name,
        error
    );
    deny(ctx, &error.to_string()).await
}

/// Sends `text` as one or more messages, breaking between lines.
async fn say_long(ctx: Context<'_>, text: &str) -> Result<(), Error> {
    for chunk in split_message(text, MESSAGE_LIMIT) {
        ctx.say(chunk).await?;
    }
    Ok(())
}

fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let mut line = line;
        while line.chars().count() > limit {
            let split_at = line
                .char_indices()
                .nth(limit)
                .map(|(index, _)| index)
                .unwrap_or(line.len());
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(line[..split_at].to_string());
            line = &line[split_at..];
        }

        let needed = if current.is_empty() { 0 } else { 1 } + line.chars().count();
        if current.chars().count() + needed > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn describe_achievements(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("\n\u{1f3c6} Achievement unlocked: **{}**", name))
        .collect()
}

fn describe_action(outcome: &ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Completed(completion) => format!(
            "\u{2705} Task completed: **{}**\nPoints earned: {} | Total points: {} | Tasks completed: {}{}",
            completion.task_name,
            completion.points_awarded,
            completion.new_total,
            completion.tasks_completed,
            describe_achievements(&completion.achievements)
        ),
        ActionOutcome::InProgress(progress) => format!(
            "\u{1f504} Progress on **{}**: {}/{} actions completed. {} more to go.",
            progress.task_name,
            progress.completed_actions,
            progress.required_actions,
            progress
                .required_actions
                .saturating_sub(progress.completed_actions)
        ),
    }
}
