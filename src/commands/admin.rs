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
use poise::serenity_prelude as serenity;
use poise::CreateReply;
use tracing::{info, trace};

use std::fmt::Write as _;

use super::{describe_achievements, guild_id, is_admin, reject, say_long};
use crate::engine::catalog::NewTask;
use crate::store::models::TaskType;
use crate::{Context, Error};

/// Add a new task (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn addtask(
    ctx: Context<'_>,
    #[description = "Task name"] name: String,
    #[description = "Task description"] description: String,
    #[description = "Points reward"]
    #[min = 1]
    points: u64,
    #[description = "Number of required actions to complete (1-50)"]
    #[min = 1]
    #[max = 50]
    required_actions: u32,
    #[description = "Task type"]
    #[rename = "type"]
    kind: Option<TaskType>,
    #[description = "Channel for task (if applicable)"] channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    trace!("Running addtask for {}", name);
    let guild_id = guild_id(ctx)?;
    let kind = kind.unwrap_or_default();
    let bound_channel = channel.map(|channel| channel.id().get());

    let task = NewTask {
        name: name.clone(),
        description,
        points,
        required_actions: required_actions.clamp(1, 50),
        kind,
        bound_channel,
        created_by: ctx.author().id.get(),
    };
    if let Err(e) = ctx.data().engine.define_task(guild_id, task).await {
        return reject(ctx, e).await;
    }

    let mut reply = format!(
        "\u{2705} Task added: **{}**\nPoints: {} | Required actions: {} | Type: {}",
        name,
        points,
        required_actions,
        kind.as_str()
    );
    match bound_channel {
        Some(channel) => {
            let _ = write!(reply, "\nChannel: <#{}>", channel);
        }
        None if kind.capabilities().requires_bound_channel => {
            reply.push_str(
                "\n\u{26a0}\u{fe0f} No channel was given, so this task can only be completed with `/completetask`.",
            );
        }
        None => {}
    }

    ctx.say(reply).await?;
    Ok(())
}

/// Remove a task (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn removetask(
    ctx: Context<'_>,
    #[description = "Select task to remove"] task: String,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let dropped = match ctx.data().engine.remove_task(guild_id, &task).await {
        Ok(dropped) => dropped,
        Err(e) => return reject(ctx, e).await,
    };

    let mut reply = format!("\u{1f5d1}\u{fe0f} Task \"{}\" has been removed.", task);
    if dropped > 0 {
        let _ = write!(reply, " {} active attempt(s) were cancelled.", dropped);
    }
    ctx.say(reply).await?;
    Ok(())
}

/// Add points to a user (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn addpoints(
    ctx: Context<'_>,
    #[description = "User to add points to"] user: serenity::User,
    #[description = "Points to add"]
    #[min = 1]
    points: u64,
    #[description = "Reason for adding points"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let reason = reason.unwrap_or_else(|| String::from("Manual addition by admin"));

    let adjustment = match ctx
        .data()
        .engine
        .add_points(guild_id, user.id.get(), points, &reason)
        .await
    {
        Ok(adjustment) => adjustment,
        Err(e) => return reject(ctx, e).await,
    };

    ctx.say(format!(
        "\u{1f4b0} Added **{}** points to {}\nReason: {}\nNew total: {}{}",
        adjustment.delta,
        user.name,
        reason,
        adjustment.new_total,
        describe_achievements(&adjustment.achievements)
    ))
    .await?;
    Ok(())
}

/// Remove points from a user (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn removepoints(
    ctx: Context<'_>,
    #[description = "User to remove points from"] user: serenity::User,
    #[description = "Points to remove"]
    #[min = 1]
    points: u64,
    #[description = "Reason for removing points"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let reason = reason.unwrap_or_else(|| String::from("Manual removal by admin"));

    let adjustment = match ctx
        .data()
        .engine
        .remove_points(guild_id, user.id.get(), points, &reason)
        .await
    {
        Ok(adjustment) => adjustment,
        Err(e) => return reject(ctx, e).await,
    };

    ctx.say(format!(
        "\u{1f4b8} Removed **{}** points from {}\nReason: {}\nNew total: {}",
        adjustment.delta.unsigned_abs(),
        user.name,
        reason,
        adjustment.new_total
    ))
    .await?;
    Ok(())
}

/// Reset the leaderboard (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn resetleaderboard(
    ctx: Context<'_>,
    #[description = "Confirm reset (type true)"] confirm: bool,
) -> Result<(), Error> {
    if !confirm {
        let reply = CreateReply::default()
            .content("\u{26a0}\u{fe0f} Set `confirm` to true to reset the leaderboard.")
            .ephemeral(true);
        ctx.send(reply).await?;
        return Ok(());
    }

    let guild_id = guild_id(ctx)?;
    if let Err(e) = ctx.data().engine.reset_leaderboard(guild_id).await {
        return reject(ctx, e).await;
    }
    info!("Leaderboard of guild {} reset by {}", guild_id, ctx.author().id);

    ctx.say("\u{1f504} The leaderboard has been reset. All points, progress and active tasks were cleared.")
        .await?;
    Ok(())
}

/// Set staff roles (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn setstaffrole(
    ctx: Context<'_>,
    #[description = "Role to add as staff"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    if let Err(e) = ctx.data().engine.add_staff_role(guild_id, role.id.get()).await {
        return reject(ctx, e).await;
    }

    ctx.say(format!("\u{2705} {} is now a staff role.", role.name))
        .await?;
    Ok(())
}

/// Set admin roles (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn setadminrole(
    ctx: Context<'_>,
    #[description = "Role to add as admin"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    if let Err(e) = ctx.data().engine.add_admin_role(guild_id, role.id.get()).await {
        return reject(ctx, e).await;
    }

    ctx.say(format!("\u{2705} {} is now an admin role.", role.name))
        .await?;
    Ok(())
}

/// View all available tasks (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn viewtasks(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let lines: Vec<String> = ctx
        .data()
        .engine
        .read(guild_id, |guild| {
            guild
                .tasks
                .iter()
                .map(|(name, task)| {
                    let channel = task
                        .bound_channel
                        .map(|channel| format!(" | <#{}>", channel))
                        .unwrap_or_default();
                    format!(
                        "**{}** ({}): {} points, {} action(s){}",
                        name,
                        task.kind.as_str(),
                        task.points,
                        task.required_actions,
                        channel
                    )
                })
                .collect()
        })
        .await;

    if lines.is_empty() {
        ctx.say("\u{1f4cb} No tasks have been created yet. Use `/addtask` to create one!")
            .await?;
        return Ok(());
    }

    say_long(
        ctx,
        &format!("\u{1f4cb} **All Available Tasks**\n{}", lines.join("\n")),
    )
    .await
}

/// View server statistics (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn serverstats(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let stats = ctx
        .data()
        .engine
        .read(guild_id, |guild| guild.server_stats())
        .await;

    ctx.say(format!(
        "\u{1f4ca} **Server Statistics**\n\
         Total users: {}\n\
         Total points: {}\n\
         Tasks completed: {}\n\
         Active tasks: {}\n\
         Available tasks: {}\n\
         Staff roles: {}",
        stats.total_users,
        stats.total_points,
        stats.total_tasks_completed,
        stats.active_tasks,
        stats.available_tasks,
        stats.staff_roles
    ))
    .await?;
    Ok(())
}

/// Set the channel for points notifications (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn setpointschannel(
    ctx: Context<'_>,
    #[description = "Channel for points notifications"] channel: serenity::Channel,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let channel_id = channel.id().get();
    if let Err(e) = ctx
        .data()
        .engine
        .set_points_channel(guild_id, channel_id)
        .await
    {
        return reject(ctx, e).await;
    }

    ctx.say(format!(
        "\u{2705} Points notifications will be posted in <#{}>.",
        channel_id
    ))
    .await?;
    Ok(())
}

/// Add a new daily quote (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn adddailyquote(
    ctx: Context<'_>,
    #[description = "The quote to add"] quote: String,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let count = match ctx.data().engine.add_quote(guild_id, quote.clone()).await {
        Ok(count) => count,
        Err(e) => return reject(ctx, e).await,
    };

    ctx.say(format!(
        "\u{2705} Added quote #{}: *\"{}\"*",
        count, quote
    ))
    .await?;
    Ok(())
}

/// Remove a daily quote (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn removedailyquote(
    ctx: Context<'_>,
    #[description = "Index of the quote to remove"]
    #[min = 1]
    index: u32,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let removed = match ctx
        .data()
        .engine
        .remove_quote(guild_id, index as usize)
        .await
    {
        Ok(removed) => removed,
        Err(e) => return reject(ctx, e).await,
    };

    ctx.say(format!("\u{1f5d1}\u{fe0f} Removed quote: *\"{}\"*", removed))
        .await?;
    Ok(())
}

/// View all daily quotes (Admin only)
#[poise::command(slash_command, guild_only, check = "is_admin")]
pub async fn viewdailyquotes(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let quotes = ctx
        .data()
        .engine
        .read(guild_id, |guild| guild.settings.daily_quotes.clone())
        .await;

    if quotes.is_empty() {
        ctx.say("\u{1f4ad} There are no daily quotes. Use `/adddailyquote` to add one!")
            .await?;
        return Ok(());
    }

    let list = quotes
        .iter()
        .enumerate()
        .map(|(index, quote)| format!("{}. {}", index + 1, quote))
        .collect::<Vec<_>>()
        .join("\n");
    say_long(ctx, &format!("\u{1f4ad} **Daily Quotes**\n{}", list)).await
}
