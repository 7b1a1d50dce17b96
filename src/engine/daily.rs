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
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

use super::achievements::apply_new_achievements;
use crate::error::EngineError;
use crate::store::models::{GuildState, UserId};
use crate::utils::time::is_day_after;

pub const DAILY_BONUS: u64 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyClaim {
    /// `None` if the guild has removed every quote.
    pub quote: Option<String>,
    pub bonus: u64,
    pub new_total: u64,
    pub streak: u32,
    pub achievements: Vec<&'static str>,
}

impl GuildState {
    /// Claims the daily quote for `today`. Each user can claim once per
    /// calendar day; claiming on consecutive days grows the streak, any other
    /// gap starts it over at 1.
    pub fn claim_daily<R: Rng + ?Sized>(
        &mut self,
        user_id: UserId,
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<DailyClaim, EngineError> {
        trace!("User {} claiming daily quote for {}", user_id, today);
        let quote = self.settings.daily_quotes.choose(rng).cloned();
        let user = self.ensure_user(user_id);

        if user.last_daily_quote == Some(today) {
            return Err(EngineError::AlreadyClaimedToday);
        }

        user.daily_streak = match user.last_daily_quote {
            Some(last) if is_day_after(last, today) => user.daily_streak + 1,
            _ => 1,
        };
        user.last_daily_quote = Some(today);
        user.credit(DAILY_BONUS);
        debug!("User {} daily streak is now {}", user_id, user.daily_streak);

        let achievements = apply_new_achievements(user);
        Ok(DailyClaim {
            quote,
            bonus: DAILY_BONUS,
            new_total: user.points,
            streak: user.daily_streak,
            achievements,
        })
    }
}
