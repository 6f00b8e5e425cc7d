use ansi_term::Style;
use anyhow::Result;
use chrono::Duration;
use clap::CommandFactory;

use crate::{
    stats::{
        range::{format_range, parse_range},
        work_statistics::WorkStatistics,
    },
    storage::period_store::PeriodStoreImpl,
    utils::{
        clock::{Clock, DefaultClock},
        dir::create_application_default_path,
    },
};

use super::Args;

/// Command to process the `stats` command: the totals for the four standard
/// calendar windows, the question this tool exists to answer.
pub async fn process_stats_command(no_cache: bool) -> Result<()> {
    let store = open_store()?;
    let stats = if no_cache {
        WorkStatistics::uncached(store, Box::new(DefaultClock))
    } else {
        WorkStatistics::from_store(store, Box::new(DefaultClock)).await?
    };

    let label = Style::new().bold();
    println!(
        "{} {}",
        label.paint("today:     "),
        format_duration(stats.day().await?)
    );
    println!(
        "{} {}",
        label.paint("this week: "),
        format_duration(stats.week().await?)
    );
    println!(
        "{} {}",
        label.paint("this month:"),
        format_duration(stats.month().await?)
    );
    println!(
        "{} {}",
        label.paint("this year: "),
        format_duration(stats.year().await?)
    );
    Ok(())
}

/// Command to process the `total` command: work time inside one parsed
/// ad-hoc window.
pub async fn process_total_command(range: &str) -> Result<()> {
    let now = DefaultClock.time();
    let window = match parse_range(range, now) {
        Ok(window) => window,
        Err(e) => {
            return Err(Args::command()
                .error(clap::error::ErrorKind::ValueValidation, e.to_string())
                .into());
        }
    };

    let stats = WorkStatistics::uncached(open_store()?, Box::new(DefaultClock));
    let total = stats.range_total(&window).await?;
    println!("{}: {}", format_range(&window), format_duration(total));
    Ok(())
}

pub(super) fn open_store() -> Result<PeriodStoreImpl> {
    Ok(PeriodStoreImpl::new(
        create_application_default_path()?.join("records"),
    )?)
}

pub(super) fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}
