//! Reminder scheduling.
//!
//! A minute-resolution cron scheduler that emits [`ScheduledTick`]s on an
//! mpsc channel; the binary feeds each tick into the reminder trigger.
//! Expressions are the standard 5 fields (`minute hour day-of-month month
//! day-of-week`) evaluated in the household's local offset, so `0 8 * * *`
//! means 08:00 local regardless of where the server runs.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};

// ── Cron expression parser ──────────────────────────────────────────────────

/// A parsed 5-field cron expression: minute hour dom month dow.
#[derive(Debug, Clone, PartialEq)]
pub struct CronExpr {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>, // 0=Sun, 6=Sat
}

impl CronExpr {
    /// Parse a standard 5-field cron expression.
    ///
    /// Supports: `*`, `*/N` (step), `N` (literal), `N-M` (range), `N,M` (list).
    pub fn parse(expr: &str) -> Result<Self, String> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "Expected 5 fields (minute hour dom month dow), got {}",
                fields.len()
            ));
        }

        Ok(CronExpr {
            minutes: Self::parse_field(fields[0], 0, 59)?,
            hours: Self::parse_field(fields[1], 0, 23)?,
            days_of_month: Self::parse_field(fields[2], 1, 31)?,
            months: Self::parse_field(fields[3], 1, 12)?,
            days_of_week: Self::parse_field(fields[4], 0, 6)?,
        })
    }

    fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, String> {
        let mut values = Vec::new();

        for part in field.split(',') {
            let part = part.trim();

            if let Some((base, step)) = part.split_once('/') {
                let step: u32 = step.parse().map_err(|_| format!("Invalid step: {step}"))?;
                if step == 0 {
                    return Err("Step cannot be zero".into());
                }
                let (start, end) = match base {
                    "*" => (min, max),
                    range if range.contains('-') => Self::parse_range(range, min, max)?,
                    single => (Self::parse_value(single, min, max)?, max),
                };
                values.extend((start..=end).step_by(step as usize));
            } else if part.contains('-') {
                let (start, end) = Self::parse_range(part, min, max)?;
                values.extend(start..=end);
            } else if part == "*" {
                values.extend(min..=max);
            } else {
                values.push(Self::parse_value(part, min, max)?);
            }
        }

        values.sort_unstable();
        values.dedup();
        if values.is_empty() {
            return Err("Field produced no values".into());
        }
        Ok(values)
    }

    fn parse_value(s: &str, min: u32, max: u32) -> Result<u32, String> {
        let v: u32 = s.parse().map_err(|_| format!("Invalid number: {s}"))?;
        if v < min || v > max {
            return Err(format!("{v} out of range {min}-{max}"));
        }
        Ok(v)
    }

    fn parse_range(s: &str, min: u32, max: u32) -> Result<(u32, u32), String> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid range: {s}"))?;
        let start: u32 = start.parse().map_err(|_| format!("Invalid range start: {start}"))?;
        let end: u32 = end.parse().map_err(|_| format!("Invalid range end: {end}"))?;
        if start < min || end > max || start > end {
            return Err(format!("Range {start}-{end} invalid for {min}-{max}"));
        }
        Ok((start, end))
    }

    /// Check whether the given local time matches this expression.
    pub fn matches(&self, dt: &DateTime<FixedOffset>) -> bool {
        self.minutes.contains(&dt.minute())
            && self.hours.contains(&dt.hour())
            && self.days_of_month.contains(&dt.day())
            && self.months.contains(&dt.month())
            && self.days_of_week.contains(&dt.weekday().num_days_from_sunday())
    }
}

// ── Scheduler ───────────────────────────────────────────────────────────────

/// One firing of a reminder schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTick {
    /// The cron expression that fired
    pub schedule: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ScheduleEntry {
    source: String,
    expr: CronExpr,
    last_fired: Option<DateTime<Utc>>,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Fires reminder ticks on cron schedules.
pub struct Scheduler {
    entries: Arc<RwLock<Vec<ScheduleEntry>>>,
    offset: FixedOffset,
    clock: Clock,
    poll: std::time::Duration,
}

impl Scheduler {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            offset,
            clock: Arc::new(Utc::now),
            poll: std::time::Duration::from_secs(30),
        }
    }

    /// Build from the `[reminder]` section. Returns the scheduler and one
    /// message per rejected expression.
    pub async fn from_config(
        config: &chorebot_config::ReminderConfig,
        offset: FixedOffset,
    ) -> (Self, Vec<String>) {
        let scheduler = Self::new(offset);
        let mut errors = Vec::new();
        if config.enabled {
            for schedule in &config.schedules {
                if let Err(e) = scheduler.add(schedule).await {
                    errors.push(format!("Schedule '{schedule}': {e}"));
                }
            }
        }
        (scheduler, errors)
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// How often the clock is checked. Must be under a minute for every
    /// matching minute to be seen.
    pub fn with_poll_interval(mut self, poll: std::time::Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Add a cron expression.
    pub async fn add(&self, schedule: &str) -> Result<(), String> {
        let expr = CronExpr::parse(schedule)?;
        info!(schedule = %schedule, "Adding reminder schedule");
        self.entries.write().await.push(ScheduleEntry {
            source: schedule.trim().to_string(),
            expr,
            last_fired: None,
        });
        Ok(())
    }

    /// The registered expressions, in insertion order.
    pub async fn schedules(&self) -> Vec<String> {
        self.entries.read().await.iter().map(|e| e.source.clone()).collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Entries matching `now` that have not fired in this minute yet.
    /// Marks them fired.
    pub async fn due(&self, now: DateTime<Utc>) -> Vec<ScheduledTick> {
        let local = now.with_timezone(&self.offset);
        let minute = local.format("%Y-%m-%d %H:%M").to_string();
        let mut entries = self.entries.write().await;

        entries
            .iter_mut()
            .filter(|entry| entry.expr.matches(&local))
            .filter_map(|entry| {
                let already = entry.last_fired.is_some_and(|last| {
                    last.with_timezone(&self.offset).format("%Y-%m-%d %H:%M").to_string() == minute
                });
                if already {
                    return None;
                }
                entry.last_fired = Some(now);
                Some(ScheduledTick {
                    schedule: entry.source.clone(),
                    at: now,
                })
            })
            .collect()
    }

    /// Start the background loop.
    ///
    /// Returns a receiver of ticks (the caller feeds them into the reminder
    /// trigger) and a join handle. The loop stops when the receiver drops.
    pub fn start(self) -> (mpsc::Receiver<ScheduledTick>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<ScheduledTick>(16);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let now = (self.clock)();

                for tick in self.due(now).await {
                    info!(schedule = %tick.schedule, "Reminder schedule fired");
                    if tx.send(tick).await.is_err() {
                        debug!("Tick receiver dropped, stopping scheduler");
                        return;
                    }
                }
            }
        });

        (rx, handle)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Utc.fix())
    }
}
