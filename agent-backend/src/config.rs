use std::env;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const ALLOWED_ORIGINS: &str = "ALLOWED_ORIGINS";
    // External agent process
    pub const AGENT_CMD: &str = "AGENT_CMD";
    pub const AGENT_WORKDIR: &str = "AGENT_WORKDIR";
    pub const AGENT_SYSTEM_PROMPT_PATH: &str = "AGENT_SYSTEM_PROMPT_PATH";
    pub const AGENT_TIMEOUT_SECS: &str = "AGENT_TIMEOUT_SECS";
    pub const AGENT_MAX_CONCURRENT: &str = "AGENT_MAX_CONCURRENT";
    // Per-org admission control
    pub const RATE_LIMIT_MAX_REQUESTS: &str = "RATE_LIMIT_MAX_REQUESTS";
    pub const RATE_LIMIT_WINDOW_SECS: &str = "RATE_LIMIT_WINDOW_SECS";
    // Scraping collaborator (optional; enrichment is skipped when unset)
    pub const SCRAPE_BASE_URL: &str = "SCRAPE_BASE_URL";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const DATABASE_URL: &str = "./.db/agent.db";
    pub const AGENT_CMD: &str = "claude";
    pub const AGENT_WORKDIR: &str = "/opt/onboarding-agent";
    pub const AGENT_SYSTEM_PROMPT_PATH: &str = "/opt/onboarding-agent/CLAUDE.md";
    pub const AGENT_TIMEOUT_SECS: u64 = 120;
    pub const AGENT_MAX_CONCURRENT: usize = 2;
    pub const RATE_LIMIT_MAX_REQUESTS: usize = 10;
    pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
    pub const ALLOWED_ORIGINS: &str =
        "https://app.example-merchant.com,http://localhost:5173,http://localhost:8080";
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub allowed_origins: Vec<String>,
    pub agent_cmd: String,
    pub agent_workdir: String,
    pub agent_system_prompt_path: String,
    pub agent_timeout_secs: u64,
    pub agent_max_concurrent: usize,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
    pub scrape_base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let allowed_origins = env::var(env_vars::ALLOWED_ORIGINS)
            .unwrap_or_else(|_| defaults::ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            port: env_parse(env_vars::PORT, defaults::PORT),
            database_url: env::var(env_vars::DATABASE_URL)
                .unwrap_or_else(|_| defaults::DATABASE_URL.to_string()),
            allowed_origins,
            agent_cmd: env::var(env_vars::AGENT_CMD)
                .unwrap_or_else(|_| defaults::AGENT_CMD.to_string()),
            agent_workdir: env::var(env_vars::AGENT_WORKDIR)
                .unwrap_or_else(|_| defaults::AGENT_WORKDIR.to_string()),
            agent_system_prompt_path: env::var(env_vars::AGENT_SYSTEM_PROMPT_PATH)
                .unwrap_or_else(|_| defaults::AGENT_SYSTEM_PROMPT_PATH.to_string()),
            agent_timeout_secs: env_parse(
                env_vars::AGENT_TIMEOUT_SECS,
                defaults::AGENT_TIMEOUT_SECS,
            ),
            agent_max_concurrent: env_parse(
                env_vars::AGENT_MAX_CONCURRENT,
                defaults::AGENT_MAX_CONCURRENT,
            ),
            rate_limit_max_requests: env_parse(
                env_vars::RATE_LIMIT_MAX_REQUESTS,
                defaults::RATE_LIMIT_MAX_REQUESTS,
            ),
            rate_limit_window_secs: env_parse(
                env_vars::RATE_LIMIT_WINDOW_SECS,
                defaults::RATE_LIMIT_WINDOW_SECS,
            ),
            scrape_base_url: env::var(env_vars::SCRAPE_BASE_URL).ok(),
        }
    }
}
