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
use crate::tasks::Task;

use tokio::spawn;
use tracing::{debug, error, trace};

/// Spawns a sleepy thread for each [`Task`].
pub fn run_scheduler(tasks: Vec<Box<dyn Task>>) {
    trace!("Running scheduler");
    for task in tasks {
        debug!("Spawning task {}", task.name());
        spawn(schedule_task(task));
    }
}

/// Sleeps until the task is due, runs [`Task::run`], and goes back to sleep.
async fn schedule_task(task: Box<dyn Task>) {
    loop {
        let next_run_in = task.run_in();
        debug!("Task {}: Next run in {:?}", task.name(), next_run_in);
        tokio::time::sleep(next_run_in).await;

        debug!("Running task {}", task.name());
        if let Err(e) = task.run().await {
            error!("Could not run task {}, error {:#}", task.name(), e);
        }
    }
}
