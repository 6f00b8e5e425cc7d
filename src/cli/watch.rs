use std::{io::Write, time::Duration};

use anyhow::Result;

use crate::{stats::work_statistics::WorkStatistics, utils::clock::DefaultClock};

use super::report::{format_duration, open_store};

/// Command to process the `watch` command. Builds the statistics cache once
/// and then only folds in what the daemon records while the screen is open.
pub async fn process_watch_command(refresh: Duration) -> Result<()> {
    let mut stats = WorkStatistics::from_store(open_store()?, Box::new(DefaultClock)).await?;

    loop {
        stats.update().await?;
        let line = format!(
            "today {} | week {} | month {} | year {}",
            format_duration(stats.day().await?),
            format_duration(stats.week().await?),
            format_duration(stats.month().await?),
            format_duration(stats.year().await?),
        );
        print!("\r\x1b[2K{line}");
        std::io::stdout().flush()?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                return Ok(());
            }
            _ = tokio::time::sleep(refresh) => (),
        }
    }
}
