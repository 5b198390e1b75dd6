//! Config file and environment variable handling.
//!
//! Every test points `HACKPORTAL_CONFIG_DIR` at its own temp dir and holds
//! `ENV_LOCK`, so they can share the process environment safely.

use std::env;
use std::fs;
use std::sync::Mutex;

use hackportal::Config;
use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const MANAGED_VARS: &[&str] = &[
    "HACKPORTAL_CONFIG_DIR",
    "HACKPORTAL_SITE_URL",
    "HACKPORTAL_ICON_URL",
    "HACKPORTAL_SEND_ENDPOINT",
    "HACKPORTAL_VAPID_KEY",
    "HACKPORTAL_SERVER_TOKEN",
    "HACKPORTAL_API_TOKEN",
    "HACKPORTAL_FIREBASE_API_KEY",
    "HACKPORTAL_FIREBASE_PROJECT_ID",
    "HACKPORTAL_FIREBASE_APP_ID",
];

/// Clears managed variables on creation and again on drop.
struct EnvGuard {
    dir: TempDir,
}

impl EnvGuard {
    fn new() -> Self {
        for var in MANAGED_VARS {
            env::remove_var(var);
        }
        let dir = TempDir::new().unwrap();
        env::set_var("HACKPORTAL_CONFIG_DIR", dir.path());
        Self { dir }
    }

    fn set(&self, key: &str, value: &str) {
        env::set_var(key, value);
    }

    fn config_file(&self) -> std::path::PathBuf {
        self.dir.path().join("config.json")
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for var in MANAGED_VARS {
            env::remove_var(var);
        }
    }
}

fn lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[test]
fn defaults_without_file_or_env() {
    let _lock = lock();
    let _env = EnvGuard::new();

    let config = Config::load().unwrap();
    assert_eq!(config.site_url, "http://localhost:3000");
    assert_eq!(config.send_endpoint, "https://fcm.googleapis.com/fcm/send");
    assert!(!config.has_server_token());
}

#[test]
fn env_overrides_win_over_file() {
    let _lock = lock();
    let env = EnvGuard::new();
    fs::write(
        env.config_file(),
        r#"{
            "site_url": "https://file.example.com",
            "provider": { "apiKey": "file-key", "projectId": "file-project" },
            "icon_url": "https://file.example.com/icon.png",
            "send_endpoint": "https://fcm.googleapis.com/fcm/send"
        }"#,
    )
    .unwrap();
    env.set("HACKPORTAL_SITE_URL", "https://env.example.com");
    env.set("HACKPORTAL_FIREBASE_API_KEY", "env-key");

    let config = Config::load().unwrap();
    assert_eq!(config.site_url, "https://env.example.com");
    assert_eq!(config.provider.api_key, "env-key");
    assert_eq!(config.provider.project_id, "file-project");
    assert_eq!(config.icon_url, "https://file.example.com/icon.png");
}

#[test]
fn credentials_come_only_from_env() {
    let _lock = lock();
    let env = EnvGuard::new();
    env.set("HACKPORTAL_VAPID_KEY", "BVapid");
    env.set("HACKPORTAL_SERVER_TOKEN", "srv-token");
    env.set("HACKPORTAL_API_TOKEN", "session");

    let config = Config::load().unwrap();
    assert_eq!(config.vapid_key, "BVapid");
    assert!(config.has_server_token());
    config.save().unwrap();

    let written = fs::read_to_string(env.config_file()).unwrap();
    assert!(!written.contains("BVapid"));
    assert!(!written.contains("srv-token"));
    assert!(!written.contains("session"));
}

#[test]
fn save_then_load_round_trips_provider() {
    let _lock = lock();
    let env = EnvGuard::new();

    let mut config = Config::default();
    config.site_url = "https://hack.example.com".to_string();
    config.provider.app_id = "1:529:web:fa23".to_string();
    config.save().unwrap();

    let loaded = Config::load().unwrap();
    assert_eq!(loaded.site_url, "https://hack.example.com");
    assert_eq!(loaded.provider.app_id, "1:529:web:fa23");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(env.config_file()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn invalid_file_falls_back_to_defaults() {
    let _lock = lock();
    let env = EnvGuard::new();
    fs::write(env.config_file(), "{ not json").unwrap();
    env.set("HACKPORTAL_FIREBASE_PROJECT_ID", "env-project");

    let config = Config::load().unwrap();
    assert_eq!(config.site_url, "http://localhost:3000");
    assert_eq!(config.provider.project_id, "env-project");
}

#[test]
fn partial_file_keeps_its_fields() {
    let _lock = lock();
    let env = EnvGuard::new();
    fs::write(
        env.config_file(),
        r#"{"site_url":"https://hack.example.com","provider":{"projectId":"p"}}"#,
    )
    .unwrap();

    let config = Config::load().unwrap();
    assert_eq!(config.site_url, "https://hack.example.com");
    assert_eq!(config.provider.project_id, "p");
    assert_eq!(config.send_endpoint, "https://fcm.googleapis.com/fcm/send");
    assert_eq!(config.icon_url, "http://localhost:3000/icons/icon-128x128.png");
}
