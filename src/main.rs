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
mod commands;
mod config;
mod engine;
mod error;
mod events;
mod notify;
mod scheduler;
mod store;
mod tasks;
mod utils;

use poise::serenity_prelude as serenity;
use shuttle_runtime::SecretStore;
use tracing::info;

use std::sync::Arc;

use config::Config;
use engine::Engine;
use notify::DiscordNotifier;
use store::persistence::JsonFile;

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared with every command and event handler.
pub struct Data {
    pub engine: Arc<Engine>,
}

#[shuttle_runtime::main]
async fn staff_points(
    #[shuttle_runtime::Secrets] secrets: SecretStore,
) -> shuttle_serenity::ShuttleSerenity {
    let config = Config::from_secrets(&secrets)?;
    let token = config.discord_token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::get_commands(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(commands::on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!(
                    "Registered {} commands for {}",
                    framework.options().commands.len(),
                    ready.user.name
                );

                let notifier = Arc::new(DiscordNotifier::new(ctx.http.clone()));
                let persistence = Box::new(JsonFile::new(config.data_file.clone()));
                let engine = Arc::new(Engine::open(persistence, notifier, config.timezone).await?);

                scheduler::run_scheduler(tasks::get_tasks(engine.clone(), &config));
                Ok(Data { engine })
            })
        })
        .build();

    // GUILDS keeps the cache filled for the Administrator check on messages.
    let intents = serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MESSAGES;
    let client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(shuttle_runtime::CustomError::new)?;

    Ok(client.into())
}
