use std::io::Write;
use std::time::Duration;

use super::{AppContext, CommandError};
use crate::aggregator::{IngestionCycle, PollScheduler};
use crate::feed::FeedFetcher;
use crate::shutdown::Shutdown;

/// Parse a duration such as `30s`, `1m`, `1h30m`, `1.5h`, or `500ms`.
///
/// A duration is one or more `<number><unit>` pairs with units `ms`, `s`,
/// `m`, `h`. Zero is rejected.
pub fn parse_duration(s: &str) -> Result<Duration, CommandError> {
    let invalid = || CommandError::InvalidDuration(s.to_string());

    let mut rest = s.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        let part = Duration::try_from_secs_f64(value * seconds_per_unit).map_err(|_| invalid())?;
        total = total.checked_add(part).ok_or_else(invalid)?;
    }

    if total.is_zero() {
        return Err(invalid());
    }
    Ok(total)
}

pub(super) async fn run<W: Write>(
    ctx: &AppContext,
    interval: &str,
    out: &mut W,
    shutdown: Shutdown,
) -> Result<(), CommandError> {
    let interval = parse_duration(interval)?;
    let mut scheduler = PollScheduler::new(interval)?;
    let fetcher = FeedFetcher::new(&ctx.config.user_agent, ctx.config.fetch_timeout())?;
    let mut cycle = IngestionCycle::new(ctx.db.clone(), fetcher);

    writeln!(out, "Collecting feeds every {:?}", interval)?;
    out.flush()?;

    let cycles = scheduler.run(&mut cycle, shutdown).await;
    writeln!(out, "Stopped after {} cycle(s)", cycles)?;
    Ok(())
}
