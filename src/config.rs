use crate::services::clock::{parse_tz_offset, RestaurantClock};
use chrono::{Duration, FixedOffset, Offset, Utc};
use dotenvy::var;

/// Tunables of the allocation engine. Defaults match a 2-hour sitting on a 30-minute grid.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub tz: FixedOffset,
    pub dining_minutes: i64,
    pub slot_granularity_minutes: i64,
    pub arrival_window_minutes: i64,
    pub called_timeout_minutes: i64,
    pub billing_delay_minutes: i64,
    pub billing_interval_secs: u64,
    pub waiting_sweep_interval_secs: u64,
    pub suggestion_horizon_days: u32,
    pub suggestions_per_day: usize,
    pub confirmation_code_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tz: Utc.fix(),
            dining_minutes: 120,
            slot_granularity_minutes: 30,
            arrival_window_minutes: 15,
            called_timeout_minutes: 15,
            billing_delay_minutes: 120,
            billing_interval_secs: 30,
            waiting_sweep_interval_secs: 60,
            suggestion_horizon_days: 7,
            suggestions_per_day: 3,
            confirmation_code_attempts: 10,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let tz = match var("RESTAURANT_TZ_OFFSET") {
            Ok(raw) => parse_tz_offset(&raw).unwrap_or_else(|| {
                warn!("Invalid RESTAURANT_TZ_OFFSET '{}', defaulting to +00:00", raw);
                defaults.tz
            }),
            Err(_) => defaults.tz,
        };
        Self {
            tz,
            dining_minutes: env_or("DINING_MINUTES", defaults.dining_minutes),
            slot_granularity_minutes: env_or(
                "SLOT_GRANULARITY_MINUTES",
                defaults.slot_granularity_minutes,
            ),
            arrival_window_minutes: env_or(
                "ARRIVAL_WINDOW_MINUTES",
                defaults.arrival_window_minutes,
            ),
            called_timeout_minutes: env_or(
                "CALLED_TIMEOUT_MINUTES",
                defaults.called_timeout_minutes,
            ),
            billing_delay_minutes: env_or("BILLING_DELAY_MINUTES", defaults.billing_delay_minutes),
            billing_interval_secs: env_or("BILLING_INTERVAL_SECS", defaults.billing_interval_secs),
            waiting_sweep_interval_secs: env_or(
                "WAITING_SWEEP_INTERVAL_SECS",
                defaults.waiting_sweep_interval_secs,
            ),
            suggestion_horizon_days: env_or(
                "SUGGESTION_HORIZON_DAYS",
                defaults.suggestion_horizon_days,
            ),
            suggestions_per_day: env_or("SUGGESTIONS_PER_DAY", defaults.suggestions_per_day),
            confirmation_code_attempts: env_or(
                "CONFIRMATION_CODE_ATTEMPTS",
                defaults.confirmation_code_attempts,
            ),
        }
    }

    pub fn clock(&self) -> RestaurantClock {
        RestaurantClock::new(self.tz)
    }

    pub fn dining(&self) -> Duration {
        Duration::minutes(self.dining_minutes)
    }

    pub fn slot_granularity(&self) -> Duration {
        Duration::minutes(self.slot_granularity_minutes)
    }

    pub fn arrival_window(&self) -> Duration {
        Duration::minutes(self.arrival_window_minutes)
    }

    pub fn called_timeout(&self) -> Duration {
        Duration::minutes(self.called_timeout_minutes)
    }

    pub fn billing_delay(&self) -> Duration {
        Duration::minutes(self.billing_delay_minutes)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
