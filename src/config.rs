use chrono::{Datelike, Local};
use std::{env, path::PathBuf};

pub const ADMIN_API_PREFIX: &str = "/api/admin/api";
pub const MEMBER_API_PREFIX: &str = "/api";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub session_dir: PathBuf,
    pub year: i32,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, session_dir: impl Into<PathBuf>, year: i32) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            session_dir: session_dir.into(),
            year,
        }
    }

    pub fn from_env() -> Self {
        let api_url = env::var("BADER_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let session_dir = env::var("BADER_SESSION_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));
        let year = env::var("BADER_YEAR")
            .ok()
            .and_then(|value| value.parse::<i32>().ok())
            .unwrap_or_else(current_year);

        Self::new(api_url, session_dir, year)
    }

    pub fn admin_base(&self) -> String {
        format!("{}{}", self.api_url, ADMIN_API_PREFIX)
    }

    pub fn member_base(&self) -> String {
        format!("{}{}", self.api_url, MEMBER_API_PREFIX)
    }
}

pub fn current_year() -> i32 {
    Local::now().year()
}

pub fn today_string() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}
