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
use tracing::{debug, info, trace, warn};

use crate::error::EngineError;
use crate::store::models::{EventClass, RoleId};
use crate::{Data, Error};

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!("{} is online!", data_about_bot.user.name);
        }
        serenity::FullEvent::Message { new_message } => {
            on_message(ctx, new_message, data).await;
        }
        _ => {}
    }
    Ok(())
}

/// Counts a staff member's message towards any message task bound to the
/// channel it was sent in.
async fn on_message(ctx: &serenity::Context, message: &serenity::Message, data: &Data) {
    if message.author.bot {
        return;
    }
    let Some(guild_id) = message.guild_id else {
        return;
    };

    let guild = guild_id.get();
    let user = message.author.id.get();
    let channel = message.channel_id.get();

    // Most messages match nothing, so skip the role lookup for them.
    if !data
        .engine
        .has_passive_match(guild, user, channel, EventClass::Message)
        .await
    {
        return;
    }
    trace!("Message from {} in {} may advance a task", user, channel);

    let (roles, administrator) = author_capabilities(ctx, message, guild_id);
    let staff = data
        .engine
        .read(guild, |state| state.settings.is_staff(&roles, administrator))
        .await;
    if !staff {
        debug!("Ignoring message from non-staff user {}", user);
        return;
    }

    match data
        .engine
        .auto_advance_on_event(guild, user, channel, EventClass::Message)
        .await
    {
        Ok(Some(outcome)) => debug!("Message from {} advanced a task: {:?}", user, outcome),
        Ok(None) => {}
        Err(e @ EngineError::TaskVanished(_)) => warn!("Passive progress for {}: {}", user, e),
        Err(e) => debug!("Passive progress for {} refused: {}", user, e),
    }
}

/// Role ids of the message author and whether any of them, or guild
/// ownership, grants Administrator.
fn author_capabilities(
    ctx: &serenity::Context,
    message: &serenity::Message,
    guild_id: serenity::GuildId,
) -> (Vec<RoleId>, bool) {
    let roles: Vec<serenity::RoleId> = message
        .member
        .as_ref()
        .map(|member| member.roles.clone())
        .unwrap_or_default();
    // @everyone shares the guild's id.
    let everyone = serenity::RoleId::new(guild_id.get());

    let administrator = ctx.cache.guild(guild_id).is_some_and(|guild| {
        guild.owner_id == message.author.id
            || roles
                .iter()
                .chain(std::iter::once(&everyone))
                .filter_map(|role| guild.roles.get(role))
                .any(|role| role.permissions.administrator())
    });

    (roles.iter().map(|role| role.get()).collect(), administrator)
}
