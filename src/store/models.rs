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
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, HashMap};

pub type GuildId = u64;
pub type UserId = u64;
pub type ChannelId = u64;
pub type RoleId = u64;

/// Quotes every guild starts out with.
pub const DEFAULT_QUOTES: [&str; 10] = [
    "Success is not final, failure is not fatal: it is the courage to continue that counts.",
    "The way to get started is to quit talking and begin doing.",
    "Innovation distinguishes between a leader and a follower.",
    "Your limitation\u{2014}it's only your imagination.",
    "Great things never come from comfort zones.",
    "Dream it. Wish it. Do it.",
    "Success doesn't just find you. You have to go out and get it.",
    "The harder you work for something, the greater you'll feel when you achieve it.",
    "Don't stop when you're tired. Stop when you're done.",
    "Wake up with determination. Go to bed with satisfaction.",
];

/// The class of platform event that can advance a task without a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventClass {
    Message,
}

/// What the engine is allowed to do with a task of a given [`TaskType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Event class that advances the task on its own, if any.
    pub passive_trigger: Option<EventClass>,
    pub requires_bound_channel: bool,
    /// Whether starting the task immediately counts as one action.
    pub checks_on_start: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, poise::ChoiceParameter)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[name = "Manual"]
    Manual,
    #[name = "Send Message"]
    SendMessage,
    #[name = "Check Channel"]
    CheckChannel,
    #[name = "Upload Image"]
    UploadImage,
    #[name = "React to Messages"]
    ReactMessages,
    #[name = "Join Voice Channel"]
    JoinVoice,
    #[name = "Create Thread"]
    CreateThread,
    #[name = "Pin Message"]
    PinMessage,
    #[name = "Add Role"]
    AddRole,
    #[name = "Remove Role"]
    RemoveRole,
    #[name = "Kick Member"]
    KickMember,
    #[name = "Ban Member"]
    BanMember,
    #[name = "Timeout Member"]
    TimeoutMember,
    #[name = "Delete Messages"]
    DeleteMessages,
    #[name = "Create Invite"]
    CreateInvite,
    #[name = "Edit Message"]
    EditMessage,
    #[name = "Use Slash Command"]
    UseSlashCommand,
    #[name = "Create Poll"]
    CreatePoll,
    #[name = "Start Event"]
    StartEvent,
    #[name = "Moderate Chat"]
    ModerateChat,
    #[name = "Help Members"]
    HelpMembers,
    #[name = "Update Server"]
    UpdateServer,
    #[name = "Review Reports"]
    ReviewReports,
    #[name = "Host Activity"]
    HostActivity,
    #[name = "Welcome Members"]
    WelcomeMembers,
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::Manual
    }
}

impl TaskType {
    /// Only `send_message` has real detection behind it. `check_channel` wants a
    /// channel but is otherwise counted like every other non-manual type.
    pub fn capabilities(self) -> Capabilities {
        match self {
            TaskType::Manual => Capabilities {
                passive_trigger: None,
                requires_bound_channel: false,
                checks_on_start: false,
            },
            TaskType::SendMessage => Capabilities {
                passive_trigger: Some(EventClass::Message),
                requires_bound_channel: true,
                checks_on_start: true,
            },
            TaskType::CheckChannel => Capabilities {
                passive_trigger: None,
                requires_bound_channel: true,
                checks_on_start: true,
            },
            _ => Capabilities {
                passive_trigger: None,
                requires_bound_channel: false,
                checks_on_start: true,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Manual => "manual",
            TaskType::SendMessage => "send_message",
            TaskType::CheckChannel => "check_channel",
            TaskType::UploadImage => "upload_image",
            TaskType::ReactMessages => "react_messages",
            TaskType::JoinVoice => "join_voice",
            TaskType::CreateThread => "create_thread",
            TaskType::PinMessage => "pin_message",
            TaskType::AddRole => "add_role",
            TaskType::RemoveRole => "remove_role",
            TaskType::KickMember => "kick_member",
            TaskType::BanMember => "ban_member",
            TaskType::TimeoutMember => "timeout_member",
            TaskType::DeleteMessages => "delete_messages",
            TaskType::CreateInvite => "create_invite",
            TaskType::EditMessage => "edit_message",
            TaskType::UseSlashCommand => "use_slash_command",
            TaskType::CreatePoll => "create_poll",
            TaskType::StartEvent => "start_event",
            TaskType::ModerateChat => "moderate_chat",
            TaskType::HelpMembers => "help_members",
            TaskType::UpdateServer => "update_server",
            TaskType::ReviewReports => "review_reports",
            TaskType::HostActivity => "host_activity",
            TaskType::WelcomeMembers => "welcome_members",
        }
    }
}

/// A task template defined by a guild admin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub description: String,
    pub points: u64,
    pub required_actions: u32,
    #[serde(rename = "type", default)]
    pub kind: TaskType,
    #[serde(rename = "channelId", default)]
    pub bound_channel: Option<ChannelId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// One user's in-flight attempt at one task. Points and required actions are
/// copied from the definition when the task is started.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTaskRecord {
    pub start_time: DateTime<Utc>,
    pub points: u64,
    pub required_actions: u32,
    #[serde(default)]
    pub completed_actions: u32,
}

impl ActiveTaskRecord {
    pub fn snapshot(task: &TaskDefinition, start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            points: task.points,
            required_actions: task.required_actions.max(1),
            completed_actions: 0,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.required_actions.saturating_sub(self.completed_actions)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub points: u64,
    pub tasks_completed: u64,
    pub daily_streak: u32,
    #[serde(default)]
    pub last_daily_quote: Option<NaiveDate>,
    pub join_date: DateTime<Utc>,
    pub total_tasks_started: u64,
    #[serde(default)]
    pub achievements: Vec<String>,
}

impl UserRecord {
    pub fn new(join_date: DateTime<Utc>) -> Self {
        Self {
            points: 0,
            tasks_completed: 0,
            daily_streak: 0,
            last_daily_quote: None,
            join_date,
            total_tasks_started: 0,
            achievements: Vec::new(),
        }
    }

    /// Adds `amount` points and returns the new total.
    pub fn credit(&mut self, amount: u64) -> u64 {
        self.points = self.points.saturating_add(amount);
        self.points
    }

    /// Removes up to `amount` points, never going below zero. Returns the new total.
    pub fn debit(&mut self, amount: u64) -> u64 {
        self.points = self.points.saturating_sub(amount);
        self.points
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub staff_roles: Vec<RoleId>,
    #[serde(default)]
    pub admin_roles: Vec<RoleId>,
    #[serde(default)]
    pub points_channel: Option<ChannelId>,
    #[serde(default)]
    pub daily_quotes: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            staff_roles: Vec::new(),
            admin_roles: Vec::new(),
            points_channel: None,
            daily_quotes: DEFAULT_QUOTES.iter().map(|q| q.to_string()).collect(),
        }
    }
}

/// Everything the bot knows about a single guild.
///
/// Tasks and active records are kept in [`BTreeMap`]s so listings and the
/// "first matching task" lookup for passive events are ordered by task name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildState {
    #[serde(default)]
    pub users: HashMap<UserId, UserRecord>,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskDefinition>,
    #[serde(default)]
    pub active_tasks: HashMap<UserId, BTreeMap<String, ActiveTaskRecord>>,
    #[serde(default)]
    pub settings: Settings,
}
