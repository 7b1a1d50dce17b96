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
use tracing::debug;

use crate::store::models::UserRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Metric {
    TasksCompleted,
    Points,
    DailyStreak,
}

#[derive(Debug)]
pub struct Achievement {
    pub name: &'static str,
    pub description: &'static str,
    metric: Metric,
    threshold: u64,
}

impl Achievement {
    const fn new(
        name: &'static str,
        description: &'static str,
        metric: Metric,
        threshold: u64,
    ) -> Self {
        Self {
            name,
            description,
            metric,
            threshold,
        }
    }

    pub fn is_earned_by(&self, user: &UserRecord) -> bool {
        let value = match self.metric {
            Metric::TasksCompleted => user.tasks_completed,
            Metric::Points => user.points,
            Metric::DailyStreak => u64::from(user.daily_streak),
        };
        value >= self.threshold
    }
}

/// Every achievement, in the order they are awarded and listed.
pub const CATALOG: [Achievement; 14] = [
    Achievement::new("First Steps", "Complete your first task", Metric::TasksCompleted, 1),
    Achievement::new("Getting Started", "Complete 5 tasks", Metric::TasksCompleted, 5),
    Achievement::new("Dedicated Staff", "Complete 10 tasks", Metric::TasksCompleted, 10),
    Achievement::new("Task Master", "Complete 25 tasks", Metric::TasksCompleted, 25),
    Achievement::new("Workaholic", "Complete 50 tasks", Metric::TasksCompleted, 50),
    Achievement::new("Centurion", "Complete 100 tasks", Metric::TasksCompleted, 100),
    Achievement::new("Point Collector", "Earn 100 points", Metric::Points, 100),
    Achievement::new("Rising Star", "Earn 500 points", Metric::Points, 500),
    Achievement::new("Elite Staff", "Earn 1000 points", Metric::Points, 1000),
    Achievement::new("Legendary Staff", "Earn 5000 points", Metric::Points, 5000),
    Achievement::new("Consistent", "Maintain a 3-day streak", Metric::DailyStreak, 3),
    Achievement::new("Dedicated", "Maintain a 7-day streak", Metric::DailyStreak, 7),
    Achievement::new("Committed", "Maintain a 14-day streak", Metric::DailyStreak, 14),
    Achievement::new("Unstoppable", "Maintain a 30-day streak", Metric::DailyStreak, 30),
];

/// Names of every achievement the user's current stats qualify for.
pub fn evaluate(user: &UserRecord) -> Vec<&'static str> {
    CATALOG
        .iter()
        .filter(|achievement| achievement.is_earned_by(user))
        .map(|achievement| achievement.name)
        .collect()
}

/// Records any achievements the user has earned but not yet been given and
/// returns them in catalog order. Calling it again without a stat change
/// returns nothing.
pub fn apply_new_achievements(user: &mut UserRecord) -> Vec<&'static str> {
    let unlocked: Vec<&'static str> = evaluate(user)
        .into_iter()
        .filter(|name| !user.achievements.iter().any(|held| held == name))
        .collect();

    for name in &unlocked {
        user.achievements.push(name.to_string());
    }

    if !unlocked.is_empty() {
        debug!("New achievements unlocked: {:?}", unlocked);
    }
    unlocked
}

/// Pairs every catalog entry with whether the user holds it.
pub fn standings(user: &UserRecord) -> Vec<(&'static Achievement, bool)> {
    CATALOG
        .iter()
        .map(|achievement| {
            let held = user.achievements.iter().any(|name| name == achievement.name);
            (achievement, held)
        })
        .collect()
}
