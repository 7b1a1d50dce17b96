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
use tracing::{debug, trace};

use std::fmt::Write as _;

use super::{
    describe_achievements, describe_action, guild_id, is_staff, member_capabilities, reject,
    say_long,
};
use crate::engine::achievements::{standings, CATALOG};
use crate::engine::ledger::Standing;
use crate::error::EngineError;
use crate::utils::time::{date_timestamp, relative_timestamp};
use crate::{Context, Error};

/// Start a task to earn points
#[poise::command(slash_command, guild_only, check = "is_staff")]
pub async fn starttask(
    ctx: Context<'_>,
    #[description = "Select a task to start"] task: String,
) -> Result<(), Error> {
    trace!("Running starttask for {}", task);
    let guild_id = guild_id(ctx)?;
    let user_id = ctx.author().id.get();

    let outcome = match ctx.data().engine.start_task(guild_id, user_id, &task).await {
        Ok(outcome) => outcome,
        Err(e) => return reject(ctx, e).await,
    };

    let mut reply = format!(
        "\u{1f4cb} Task started: **{}**\n{}\nPoints: {} | Required actions: {} | Type: {}",
        task,
        outcome.task.description,
        outcome.record.points,
        outcome.record.required_actions,
        outcome.task.kind.as_str()
    );
    if let Some(channel) = outcome.task.bound_channel {
        let _ = write!(reply, "\nChannel: <#{}>", channel);
    }
    match &outcome.auto_check {
        Some(check) => {
            reply.push('\n');
            reply.push_str(&describe_action(check));
        }
        None => reply.push_str("\nUse `/completetask` once you are done."),
    }

    ctx.say(reply).await?;
    Ok(())
}

/// Complete your active task
#[poise::command(slash_command, guild_only, check = "is_staff")]
pub async fn completetask(
    ctx: Context<'_>,
    #[description = "Select a task to complete"] task: Option<String>,
    #[description = "Provide proof of task completion"] proof: Option<String>,
) -> Result<(), Error> {
    trace!("Running completetask for {:?}", task);
    let guild_id = guild_id(ctx)?;
    let user_id = ctx.author().id.get();
    let engine = &ctx.data().engine;

    let mut reply = match task {
        Some(task) => match engine.record_action(guild_id, user_id, &task).await {
            Ok(outcome) => describe_action(&outcome),
            Err(e) => return reject(ctx, e).await,
        },
        None => {
            let batch = match engine.complete_all_active(guild_id, user_id).await {
                Ok(batch) => batch,
                Err(e) => return reject(ctx, e).await,
            };

            let mut reply = if batch.completed.is_empty() {
                String::from("\u{1f504} You've made progress on your tasks.")
            } else {
                String::from("\u{2705} Tasks updated.")
            };
            for (name, points) in &batch.completed {
                let _ = write!(reply, "\n\u{2705} **{}**: +{} points", name, points);
            }
            for progress in &batch.in_progress {
                let _ = write!(
                    reply,
                    "\n\u{1f504} **{}**: {}/{} actions",
                    progress.task_name, progress.completed_actions, progress.required_actions
                );
            }
            for name in &batch.orphaned {
                let _ = write!(reply, "\n\u{26a0}\u{fe0f} **{}** no longer exists and was dropped", name);
            }
            if batch.points_awarded > 0 {
                let _ = write!(
                    reply,
                    "\nPoints earned: {} | Total points: {}",
                    batch.points_awarded, batch.new_total
                );
            }
            reply.push_str(&describe_achievements(&batch.achievements));
            reply
        }
    };

    if let Some(proof) = proof {
        debug!("User {} submitted proof: {}", user_id, proof);
        let _ = write!(reply, "\nProof: {}", proof);
    }

    say_long(ctx, &reply).await
}

/// View your active tasks
#[poise::command(slash_command, guild_only, check = "is_staff")]
pub async fn mytasks(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let user_id = ctx.author().id.get();

    let lines: Vec<String> = ctx
        .data()
        .engine
        .read(guild_id, |guild| {
            guild
                .active_tasks_of(user_id)
                .into_iter()
                .map(|(name, record, task)| {
                    let kind = task.map_or("removed", |task| task.kind.as_str());
                    format!(
                        "**{}** ({})\nProgress: {}/{} ({} to go) | Points: {} | Started {}",
                        name,
                        kind,
                        record.completed_actions,
                        record.required_actions,
                        record.remaining(),
                        record.points,
                        relative_timestamp(record.start_time)
                    )
                })
                .collect()
        })
        .await;

    if lines.is_empty() {
        ctx.say("\u{1f4cb} You do not have any active tasks. Use `/starttask` to start one!")
            .await?;
        return Ok(());
    }

    say_long(
        ctx,
        &format!("\u{1f4cb} **Your Active Tasks**\n{}", lines.join("\n")),
    )
    .await
}

fn format_standings(standings: &[Standing]) -> String {
    standings
        .iter()
        .map(|standing| {
            let medal = match standing.rank {
                1 => "\u{1f947}",
                2 => "\u{1f948}",
                3 => "\u{1f949}",
                _ => "\u{25ab}\u{fe0f}",
            };
            format!(
                "{} **#{}** <@{}>: {} points ({} tasks)",
                medal, standing.rank, standing.user_id, standing.points, standing.tasks_completed
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// View the points leaderboard
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "Page number"]
    #[min = 1]
    page: Option<u32>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let page = page.unwrap_or(1).max(1);

    let standings = ctx
        .data()
        .engine
        .read(guild_id, |guild| guild.leaderboard(page as usize))
        .await;
    if standings.is_empty() {
        ctx.say("\u{1f4ca} No users found on this page!").await?;
        return Ok(());
    }

    ctx.say(format!(
        "\u{1f3c6} **Staff Points Leaderboard** (page {})\n{}",
        page,
        format_standings(&standings)
    ))
    .await?;
    Ok(())
}

/// View top 10 staff members
#[poise::command(slash_command, guild_only)]
pub async fn topten(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let standings = ctx
        .data()
        .engine
        .read(guild_id, |guild| guild.top_ten())
        .await;
    if standings.is_empty() {
        ctx.say("\u{1f4ca} No users found!").await?;
        return Ok(());
    }

    ctx.say(format!(
        "\u{1f3c6} **Top 10 Staff Members**\n{}",
        format_standings(&standings)
    ))
    .await?;
    Ok(())
}

/// Get your daily motivational quote and bonus points
#[poise::command(slash_command, guild_only, check = "is_staff")]
pub async fn dailyquote(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let user_id = ctx.author().id.get();

    let claim = match ctx.data().engine.claim_daily(guild_id, user_id).await {
        Ok(claim) => claim,
        Err(e) => return reject(ctx, e).await,
    };

    let mut reply = String::from("\u{1f4ad} **Daily Motivational Quote**");
    if let Some(quote) = &claim.quote {
        let _ = write!(reply, "\n*\"{}\"*", quote);
    }
    let _ = write!(
        reply,
        "\nBonus: +{} points | Total points: {} | Streak: {} day{}",
        claim.bonus,
        claim.new_total,
        claim.streak,
        if claim.streak == 1 { "" } else { "s" }
    );
    reply.push_str(&describe_achievements(&claim.achievements));

    ctx.say(reply).await?;
    Ok(())
}

/// View your staff profile
#[poise::command(slash_command, guild_only)]
pub async fn profile(
    ctx: Context<'_>,
    #[description = "View another user's profile"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    let target_id = target.id.get();

    let profile = ctx
        .data()
        .engine
        .read(guild_id, |guild| guild.profile(target_id))
        .await;
    let rank = profile
        .rank
        .map_or_else(|| String::from("Unranked"), |rank| format!("#{}", rank));
    let user = &profile.user;

    ctx.say(format!(
        "\u{1f4ca} **{}'s Staff Profile**\n\
         Points: {} | Rank: {}\n\
         Tasks completed: {} | Tasks started: {}\n\
         Daily streak: {} | Achievements: {}/{}\n\
         Joined: {}",
        target.name,
        user.points,
        rank,
        user.tasks_completed,
        user.total_tasks_started,
        user.daily_streak,
        user.achievements.len(),
        CATALOG.len(),
        date_timestamp(user.join_date)
    ))
    .await?;
    Ok(())
}

/// View your achievements
#[poise::command(slash_command, guild_only)]
pub async fn achievements(
    ctx: Context<'_>,
    #[description = "View another user's achievements"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    let target_id = target.id.get();

    let lines: Vec<String> = ctx
        .data()
        .engine
        .read(guild_id, |guild| {
            let profile = guild.profile(target_id);
            standings(&profile.user)
                .into_iter()
                .map(|(achievement, held)| {
                    let mark = if held { "\u{2705}" } else { "\u{1f512}" };
                    format!("{} **{}**: {}", mark, achievement.name, achievement.description)
                })
                .collect()
        })
        .await;

    say_long(
        ctx,
        &format!("\u{1f3c6} **{}'s Achievements**\n{}", target.name, lines.join("\n")),
    )
    .await
}

/// Get information about a specific task
#[poise::command(slash_command, guild_only)]
pub async fn taskinfo(
    ctx: Context<'_>,
    #[description = "Select a task to view info"] task: String,
) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let user_id = ctx.author().id.get();
    let (definition, progress) = ctx
        .data()
        .engine
        .read(guild_id, |guild| {
            (
                guild.task(&task).cloned(),
                guild.active_task(user_id, &task).cloned(),
            )
        })
        .await;
    let Some(definition) = definition else {
        return reject(ctx, EngineError::TaskNotFound(task)).await;
    };

    let mut reply = format!(
        "\u{1f4cb} **Task Information: {}**\n{}\nPoints: {} | Required actions: {} | Type: {}",
        task,
        definition.description,
        definition.points,
        definition.required_actions,
        definition.kind.as_str()
    );
    if let Some(channel) = definition.bound_channel {
        let _ = write!(reply, "\nChannel: <#{}>", channel);
    }
    let _ = write!(
        reply,
        "\nCreated by <@{}> {}",
        definition.created_by,
        relative_timestamp(definition.created_at)
    );
    if let Some(record) = progress {
        let _ = write!(
            reply,
            "\nYour progress: {}/{} actions, started {}",
            record.completed_actions,
            record.required_actions,
            relative_timestamp(record.start_time)
        );
    }

    ctx.say(reply).await?;
    Ok(())
}

const STAFF_HELP: &str = "**\u{1f465} Staff commands**\n\
    `/starttask` Start a task to earn points\n\
    `/completetask` Complete one active task, or all of them\n\
    `/mytasks` View your active tasks\n\
    `/leaderboard` View the points leaderboard\n\
    `/topten` View top 10 staff members\n\
    `/dailyquote` Get your daily quote and bonus points\n\
    `/profile` View your or another user's profile\n\
    `/achievements` View your achievements\n\
    `/taskinfo` Get information about a specific task\n\
    `/help` Show this help message";

const ADMIN_HELP: &str = "**\u{2699}\u{fe0f} Admin commands**\n\
    `/addtask` Add a new task\n\
    `/removetask` Remove a task\n\
    `/addpoints` Add points to a user\n\
    `/removepoints` Remove points from a user\n\
    `/resetleaderboard` Reset the leaderboard\n\
    `/setstaffrole` Set staff roles\n\
    `/setadminrole` Set admin roles\n\
    `/viewtasks` View all available tasks\n\
    `/serverstats` View server statistics\n\
    `/setpointschannel` Set the points notification channel\n\
    `/adddailyquote` Add a new daily quote\n\
    `/removedailyquote` Remove a daily quote\n\
    `/viewdailyquotes` View all daily quotes";

/// Only the sections the member may use are listed.
fn help_text(staff: bool, admin: bool) -> String {
    let mut text = String::from("\u{1f4da} **Staff Points Bot - Help**\n");
    if staff {
        text.push_str("Here are all the available commands:\n");
        text.push_str(STAFF_HELP);
    } else {
        text.push_str("\u{274c} You need to be a staff member to use this bot!");
    }
    if admin {
        text.push('\n');
        text.push_str(ADMIN_HELP);
    }
    text
}

/// View all available commands
#[poise::command(slash_command, guild_only)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = guild_id(ctx)?;
    let (roles, administrator) = member_capabilities(ctx).await;
    let (staff, admin) = ctx
        .data()
        .engine
        .read(guild_id, |guild| {
            (
                guild.settings.is_staff(&roles, administrator),
                guild.settings.is_admin(&roles, administrator),
            )
        })
        .await;

    let reply = CreateReply::default()
        .content(help_text(staff, admin))
        .ephemeral(true);
    ctx.send(reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_lists_only_permitted_sections() {
        let staff = help_text(true, false);
        assert!(staff.contains("`/starttask`"));
        assert!(!staff.contains("`/addtask`"));

        let admin = help_text(true, true);
        assert!(admin.contains("`/starttask`"));
        assert!(admin.contains("`/addtask`"));

        let outsider = help_text(false, false);
        assert!(outsider.contains("You need to be a staff member"));
        assert!(!outsider.contains("`/starttask`"));
        assert!(!outsider.contains("`/addtask`"));
    }

    #[test]
    fn test_standings_show_medals() {
        let standings = vec![
            Standing {
                rank: 1,
                user_id: 7,
                points: 90,
                tasks_completed: 3,
            },
            Standing {
                rank: 4,
                user_id: 8,
                points: 10,
                tasks_completed: 1,
            },
        ];
        assert_eq!(
            format_standings(&standings),
            "\u{1f947} **#1** <@7>: 90 points (3 tasks)\n\u{25ab}\u{fe0f} **#4** <@8>: 10 points (1 tasks)"
        );
    }
}
