use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::channel::{ChannelOptions, DEFAULT_BASE_URL};
use crate::credentials::CredentialStore;
use crate::protocol::Target;

#[derive(Debug, Parser, Clone)]
#[command(name = "tenant-shell")]
#[command(about = "Run commands against a sandboxed tenant environment")]
pub struct Config {
    /// Execution backend base URL.
    #[arg(long, env = "TENANT_SHELL_URL", default_value = DEFAULT_BASE_URL)]
    pub url: String,

    /// Initial target as ID or ID:KIND.
    #[arg(long, env = "TENANT_SHELL_TARGET")]
    pub target: Target,

    /// Bearer token; falls back to the credentials file.
    #[arg(long, env = "TENANT_SHELL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// JSON quick-action catalog; the built-in set is used when absent.
    #[arg(long)]
    pub quick_actions: Option<PathBuf>,

    #[arg(long, default_value_t = 5)]
    pub max_reconnect_attempts: u32,

    #[arg(long, default_value_t = 30_000)]
    pub max_reconnect_delay_ms: u64,

    #[arg(long, default_value_t = 30)]
    pub ping_interval_secs: u64,

    #[arg(long, default_value = "warn")]
    pub log_level: String,

    #[arg(long, default_value_t = false)]
    pub json_output: bool,
}

impl Config {
    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions::new(self.url.clone())
            .with_max_reconnect_attempts(self.max_reconnect_attempts)
            .with_max_reconnect_delay_ms(self.max_reconnect_delay_ms)
            .with_ping_interval(Duration::from_secs(self.ping_interval_secs.max(1)))
    }

    pub fn credential_store(&self) -> Option<CredentialStore> {
        self.credentials
            .clone()
            .or_else(CredentialStore::default_path)
            .map(CredentialStore::new)
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use clap::Parser;

    #[test]
    fn defaults() {
        let cfg = Config::try_parse_from(["tenant-shell", "--target", "site-1:laravel"]).unwrap();
        assert_eq!(cfg.target.id, "site-1");
        assert_eq!(cfg.target.environment.as_deref(), Some("laravel"));
        assert_eq!(cfg.max_reconnect_attempts, 5);
        assert_eq!(cfg.max_reconnect_delay_ms, 30_000);
        assert_eq!(cfg.ping_interval_secs, 30);
        assert_eq!(cfg.log_level, "warn");
        assert!(!cfg.json_output);
    }

    #[test]
    fn channel_options_follow_flags() {
        let cfg = Config::try_parse_from([
            "tenant-shell",
            "--target",
            "site-2",
            "--url",
            "https://panel.example.com",
            "--max-reconnect-attempts",
            "0",
            "--ping-interval-secs",
            "0",
        ])
        .unwrap();
        let options = cfg.channel_options();
        assert_eq!(options.base_url, "https://panel.example.com");
        assert_eq!(options.max_reconnect_attempts, 0);
        assert_eq!(options.ping_interval.as_secs(), 1);
    }

    #[test]
    fn explicit_credentials_path_is_used() {
        let cfg = Config::try_parse_from([
            "tenant-shell",
            "--target",
            "site-3",
            "--credentials",
            "/tmp/creds.json",
        ])
        .unwrap();
        let store = cfg.credential_store().unwrap();
        assert_eq!(store.path(), std::path::Path::new("/tmp/creds.json"));
    }

    #[test]
    fn rejects_empty_target() {
        assert!(Config::try_parse_from(["tenant-shell", "--target", ":node"]).is_err());
    }
}
