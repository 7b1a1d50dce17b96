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
use chrono_tz::Tz;
use tracing::debug;

/// The calendar date it currently is in `timezone`.
pub fn today_in(timezone: Tz) -> NaiveDate {
    let now = Utc::now().with_timezone(&timezone);
    debug!("now in {}: {}", timezone, now);
    now.date_naive()
}

/// Whether `today` is exactly one calendar day after `previous`.
pub fn is_day_after(previous: NaiveDate, today: NaiveDate) -> bool {
    previous.succ_opt() == Some(today)
}

/// Formats a timestamp so Discord renders it relative to the reader, e.g. "3 hours ago".
pub fn relative_timestamp(time: DateTime<Utc>) -> String {
    format!("<t:{}:R>", time.timestamp())
}

/// Formats a timestamp so Discord renders it as a date in the reader's locale.
pub fn date_timestamp(time: DateTime<Utc>) -> String {
    format!("<t:{}:D>", time.timestamp())
}
