use std::env;
use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

/// Which persistence backend the API process talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub store_backend: StoreBackend,
    /// Offset of the clinic's wall clock from UTC, in minutes.
    pub clinic_utc_offset_minutes: i32,
    pub request_timeout_seconds: u64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                String::new()
            });

        let store_backend = match env::var("STORE_BACKEND").ok().as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("supabase") => StoreBackend::Supabase,
            Some(other) => {
                warn!("Unknown STORE_BACKEND '{}', falling back to supabase", other);
                StoreBackend::Supabase
            }
            None if supabase_url.is_empty() => {
                warn!("STORE_BACKEND not set and Supabase not configured, using in-memory store");
                StoreBackend::Memory
            }
            None => StoreBackend::Supabase,
        };

        let clinic_utc_offset_minutes = parse_env("CLINIC_UTC_OFFSET_MINUTES", 0);
        let request_timeout_seconds = parse_env("REQUEST_TIMEOUT_SECONDS", 10);
        let port = parse_env("PORT", 3000);

        let config = Self {
            supabase_url,
            supabase_service_role_key,
            store_backend,
            clinic_utc_offset_minutes,
            request_timeout_seconds,
            port,
        };

        if config.store_backend == StoreBackend::Supabase && !config.is_configured() {
            warn!("Supabase backend selected but SUPABASE_URL / SUPABASE_SERVICE_ROLE_KEY are missing");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_role_key.is_empty()
    }

    /// Clinic-local offset; out-of-range values fall back to UTC.
    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                "CLINIC_UTC_OFFSET_MINUTES={} is out of range, using UTC",
                self.clinic_utc_offset_minutes
            );
            Utc.fix()
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_service_role_key: String::new(),
            store_backend: StoreBackend::Memory,
            clinic_utc_offset_minutes: 0,
            request_timeout_seconds: 10,
            port: 3000,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
