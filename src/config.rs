use axum::http::HeaderValue;
use std::env;
use std::time::Duration;

use crate::dtr::aggregate::AttendancePolicy;
use crate::dtr::scheduler::{AutoSaveConfig, DEFAULT_DEBOUNCE};
use crate::dtr::time::parse_minutes;
use crate::dtr::{RecordRules, SessionOptions, SlotWindows};

#[derive(Clone, Debug, PartialEq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub pool: PoolSettings,
    pub bind_addr: String,
    pub cors_origin: HeaderValue,
    pub rules: RecordRules,
    pub autosave_debounce: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or("DATABASE_URL must be set")?;

        let defaults = PoolSettings::default();
        let pool = PoolSettings {
            max_connections: parse_number(&lookup, "DB_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            acquire_timeout: parse_number(&lookup, "DB_ACQUIRE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.acquire_timeout),
        };

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let cors_origin = lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let cors_origin = HeaderValue::from_str(&cors_origin)
            .map_err(|_| format!("CORS_ORIGIN is not a valid header value: {}", cors_origin))?;

        let slot_windows = match lookup("DTR_SLOT_WINDOWS") {
            Some(spec) => SlotWindows::parse(&spec).map_err(|e| format!("DTR_SLOT_WINDOWS: {}", e))?,
            None => SlotWindows::default(),
        };

        let late_after = lookup("DTR_LATE_AFTER")
            .map(|v| {
                parse_minutes(v.trim())
                    .ok_or_else(|| format!("DTR_LATE_AFTER must be HH:MM, got \"{}\"", v))
            })
            .transpose()?;

        let expected_daily_minutes = parse_number(&lookup, "DTR_EXPECTED_DAILY_MINUTES")?;

        let autosave_debounce = parse_number(&lookup, "DTR_AUTOSAVE_DEBOUNCE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);

        Ok(Self {
            database_url,
            pool,
            bind_addr,
            cors_origin,
            rules: RecordRules {
                attendance: AttendancePolicy {
                    late_after,
                    expected_daily_minutes,
                },
                slot_windows,
            },
            autosave_debounce,
        })
    }

    /// Edit session settings matching this deployment.
    pub fn session_options(&self, legacy_slots: bool) -> SessionOptions {
        SessionOptions {
            legacy_slots: legacy_slots.then(|| self.rules.slot_windows.clone()),
            attendance: self.rules.attendance,
            autosave: AutoSaveConfig {
                debounce: self.autosave_debounce,
                ..AutoSaveConfig::default()
            },
        }
    }
}

fn parse_number<F, T>(lookup: &F, key: &str) -> Result<Option<T>, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| format!("{} must be a number, got \"{}\"", key, v))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/dtr")]).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.pool, PoolSettings::default());
        assert_eq!(config.autosave_debounce, Duration::from_secs(1));
        assert_eq!(config.rules.attendance, AttendancePolicy::default());
        assert_eq!(config.rules.slot_windows, SlotWindows::default());
    }

    #[test]
    fn test_database_url_is_required() {
        assert_eq!(load(&[]).unwrap_err(), "DATABASE_URL must be set");
    }

    #[test]
    fn test_business_rules_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/dtr"),
            ("DTR_SLOT_WINDOWS", "06:00-11:00,*,13:00-17:00"),
            ("DTR_LATE_AFTER", "08:15"),
            ("DTR_EXPECTED_DAILY_MINUTES", "240"),
            ("DTR_AUTOSAVE_DEBOUNCE_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.rules.attendance.late_after, Some(8 * 60 + 15));
        assert_eq!(config.rules.attendance.expected_daily_minutes, Some(240));
        assert_eq!(config.autosave_debounce, Duration::from_millis(250));
        assert!(config.rules.slot_windows.window(0, crate::dtr::ShiftField::Out).is_none());

        let options = config.session_options(true);
        assert!(options.legacy_slots.is_some());
        assert_eq!(options.autosave.debounce, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/dtr"),
            ("DTR_LATE_AFTER", "8am"),
        ])
        .unwrap_err();
        assert!(err.contains("DTR_LATE_AFTER"));

        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/dtr"),
            ("DTR_SLOT_WINDOWS", "12:00-06:00"),
        ])
        .unwrap_err();
        assert!(err.starts_with("DTR_SLOT_WINDOWS"));

        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/dtr"),
            ("DB_MAX_CONNECTIONS", "many"),
        ])
        .unwrap_err();
        assert_eq!(err, "DB_MAX_CONNECTIONS must be a number, got \"many\"");
    }
}
