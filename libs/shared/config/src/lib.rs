use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub fcm_project_id: String,
    pub fcm_access_token: String,
    pub fcm_base_url: String,
    pub sweep_interval_seconds: u64,
    pub sweep_max_concurrency: usize,
    pub io_timeout_seconds: u64,
    pub overdue_cancel_lookback_hours: i64,
    pub server_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            fcm_project_id: String::new(),
            fcm_access_token: String::new(),
            fcm_base_url: "https://fcm.googleapis.com/v1".to_string(),
            sweep_interval_seconds: 300,
            sweep_max_concurrency: 16,
            io_timeout_seconds: 10,
            overdue_cancel_lookback_hours: 24,
            server_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            fcm_project_id: env::var("FCM_PROJECT_ID")
                .unwrap_or_else(|_| {
                    warn!("FCM_PROJECT_ID not set, push delivery disabled");
                    String::new()
                }),
            fcm_access_token: env::var("FCM_ACCESS_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("FCM_ACCESS_TOKEN not set, push delivery disabled");
                    String::new()
                }),
            fcm_base_url: env::var("FCM_BASE_URL")
                .unwrap_or(defaults.fcm_base_url),
            sweep_interval_seconds: parse_or("SWEEP_INTERVAL_SECONDS", defaults.sweep_interval_seconds),
            sweep_max_concurrency: parse_or("SWEEP_MAX_CONCURRENCY", defaults.sweep_max_concurrency),
            io_timeout_seconds: parse_or("IO_TIMEOUT_SECONDS", defaults.io_timeout_seconds),
            overdue_cancel_lookback_hours: parse_or(
                "OVERDUE_CANCEL_LOOKBACK_HOURS",
                defaults.overdue_cancel_lookback_hours,
            ),
            server_port: parse_or("SERVER_PORT", defaults.server_port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_service_role_key.is_empty()
    }

    pub fn is_push_configured(&self) -> bool {
        !self.fcm_project_id.is_empty()
            && !self.fcm_access_token.is_empty()
            && !self.fcm_base_url.is_empty()
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_seconds)
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
