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
use tracing::{debug, info};

use super::achievements::apply_new_achievements;
use crate::store::models::{GuildState, UserId, UserRecord};

pub const PAGE_SIZE: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Adjustment {
    pub user_id: UserId,
    /// Points actually added or removed. Removals are clamped to the balance.
    pub delta: i64,
    pub new_total: u64,
    pub achievements: Vec<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Standing {
    pub rank: usize,
    pub user_id: UserId,
    pub points: u64,
    pub tasks_completed: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    pub user: UserRecord,
    /// `None` when the user has no record in this guild yet.
    pub rank: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub total_users: usize,
    pub total_points: u64,
    pub total_tasks_completed: u64,
    pub active_tasks: usize,
    pub available_tasks: usize,
    pub staff_roles: usize,
}

impl GuildState {
    pub fn add_points(&mut self, user_id: UserId, amount: u64) -> Adjustment {
        let user = self.ensure_user(user_id);
        let before = user.points;
        let new_total = user.credit(amount);
        let achievements = apply_new_achievements(user);
        debug!("User {} points {} -> {}", user_id, before, new_total);

        Adjustment {
            user_id,
            delta: signed(new_total - before),
            new_total,
            achievements,
        }
    }

    /// Takes points away without ever going below zero. Achievements are never
    /// revoked, so none are evaluated here.
    pub fn remove_points(&mut self, user_id: UserId, amount: u64) -> Adjustment {
        let user = self.ensure_user(user_id);
        let before = user.points;
        let new_total = user.debit(amount);
        debug!("User {} points {} -> {}", user_id, before, new_total);

        Adjustment {
            user_id,
            delta: -signed(before - new_total),
            new_total,
            achievements: Vec::new(),
        }
    }

    /// Wipes every user record and in-flight task. Task definitions and
    /// settings are kept.
    pub fn reset_leaderboard(&mut self) {
        info!(
            "Resetting leaderboard: {} users, {} users with active tasks",
            self.users.len(),
            self.active_tasks.len()
        );
        self.users.clear();
        self.active_tasks.clear();
    }

    /// Highest points first. Ties are broken by user id so pages are stable.
    fn ranked(&self) -> Vec<(UserId, &UserRecord)> {
        let mut users: Vec<(UserId, &UserRecord)> =
            self.users.iter().map(|(id, user)| (*id, user)).collect();
        users.sort_by(|(a_id, a), (b_id, b)| b.points.cmp(&a.points).then(a_id.cmp(b_id)));
        users
    }

    /// One page of the leaderboard, `page` starting at 1.
    pub fn leaderboard(&self, page: usize) -> Vec<Standing> {
        let skip = page.saturating_sub(1).saturating_mul(PAGE_SIZE);
        self.ranked()
            .into_iter()
            .enumerate()
            .skip(skip)
            .take(PAGE_SIZE)
            .map(|(index, (user_id, user))| Standing {
                rank: index + 1,
                user_id,
                points: user.points,
                tasks_completed: user.tasks_completed,
            })
            .collect()
    }

    pub fn top_ten(&self) -> Vec<Standing> {
        self.leaderboard(1)
    }

    pub fn profile(&self, user_id: UserId) -> Profile {
        let rank = self
            .ranked()
            .iter()
            .position(|(id, _)| *id == user_id)
            .map(|index| index + 1);
        let user = self
            .users
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| UserRecord::new(Utc::now()));

        Profile { user, rank }
    }

    pub fn server_stats(&self) -> ServerStats {
        ServerStats {
            total_users: self.users.len(),
            total_points: self.users.values().map(|user| user.points).sum(),
            total_tasks_completed: self.users.values().map(|user| user.tasks_completed).sum(),
            active_tasks: self.active_tasks.values().map(|tasks| tasks.len()).sum(),
            available_tasks: self.tasks.len(),
            staff_roles: self.settings.staff_roles.len(),
        }
    }
}

fn signed(points: u64) -> i64 {
    i64::try_from(points).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::tests::new_task;
    use crate::store::models::TaskType;

    #[test]
    fn test_add_points_is_exact_and_evaluates() {
        let mut guild = GuildState::default();
        guild.add_points(1, 60);
        let adjustment = guild.add_points(1, 40);

        assert_eq!(adjustment.delta, 40);
        assert_eq!(adjustment.new_total, 100);
        assert_eq!(adjustment.achievements, vec!["Point Collector"]);
    }

    #[test]
    fn test_remove_points_clamps_to_zero() {
        let mut guild = GuildState::default();
        guild.add_points(1, 30);

        let adjustment = guild.remove_points(1, 100);
        assert_eq!(adjustment.new_total, 0);
        assert_eq!(adjustment.delta, -30);
        assert_eq!(guild.users[&1].points, 0);
    }

    #[test]
    fn test_leaderboard_pages() {
        let mut guild = GuildState::default();
        for user_id in 1..=15u64 {
            guild.add_points(user_id, user_id * 10);
        }

        let first = guild.leaderboard(1);
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].user_id, 15);
        assert_eq!(first[0].rank, 1);

        let second = guild.leaderboard(2);
        assert_eq!(second.len(), 5);
        assert_eq!(second[0].rank, 11);
        assert_eq!(second[4].user_id, 1);

        assert!(guild.leaderboard(3).is_empty());
        assert_eq!(guild.top_ten(), first);
    }

    #[test]
    fn test_profile_rank() {
        let mut guild = GuildState::default();
        guild.add_points(1, 10);
        guild.add_points(2, 50);

        assert_eq!(guild.profile(1).rank, Some(2));
        assert_eq!(guild.profile(2).rank, Some(1));

        let stranger = guild.profile(3);
        assert_eq!(stranger.rank, None);
        assert_eq!(stranger.user.points, 0);
        assert!(!guild.users.contains_key(&3));
    }

    #[test]
    fn test_reset_keeps_tasks_and_settings() {
        let mut guild = GuildState::default();
        guild
            .define_task(new_task("Keep", 5, 2, TaskType::Manual))
            .unwrap();
        guild.start_task(1, "Keep").unwrap();
        guild.settings.staff_roles.push(11);

        guild.reset_leaderboard();
        assert!(guild.users.is_empty());
        assert!(guild.active_tasks.is_empty());
        assert!(guild.task("Keep").is_some());
        assert_eq!(guild.settings.staff_roles, vec![11]);
    }

    #[test]
    fn test_server_stats() {
        let mut guild = GuildState::default();
        guild
            .define_task(new_task("One", 5, 1, TaskType::Manual))
            .unwrap();
        guild
            .define_task(new_task("Two", 5, 3, TaskType::Manual))
            .unwrap();
        guild.start_task(1, "One").unwrap();
        guild.record_action(1, "One").unwrap();
        guild.start_task(2, "Two").unwrap();

        let stats = guild.server_stats();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_points, 5);
        assert_eq!(stats.total_tasks_completed, 1);
        assert_eq!(stats.active_tasks, 1);
        assert_eq!(stats.available_tasks, 2);
        assert_eq!(stats.staff_roles, 0);
    }
}
