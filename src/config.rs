use std::env;
use std::path::PathBuf;

pub const DEFAULT_SPORTMONKS_BASE: &str = "https://api.sportmonks.com/v3/football";
pub const DEFAULT_FIREBASE_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const DEFAULT_FIREBASE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

const CACHE_DIR: &str = "pitchside";
const DB_FILE: &str = "documents.sqlite";

#[derive(Debug, Clone)]
pub struct SportsApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub season_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub api_key: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub project_id: Option<String>,
    pub firestore_url: String,
}

#[derive(Debug, Clone)]
pub struct LocalAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub sports: SportsApiConfig,
    pub firebase: FirebaseConfig,
    pub db_path: Option<PathBuf>,
    pub local_admin: Option<LocalAdmin>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let sports = SportsApiConfig {
            base_url: env_string("SPORTMONKS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SPORTMONKS_BASE.to_string()),
            token: env_string("SPORTMONKS_TOKEN"),
            season_id: env_string("SPORTMONKS_SEASON_ID").and_then(|v| v.parse::<u64>().ok()),
        };

        let firebase = FirebaseConfig {
            api_key: env_string("FIREBASE_API_KEY"),
            auth_url: env_string("FIREBASE_AUTH_URL")
                .unwrap_or_else(|| DEFAULT_FIREBASE_AUTH_URL.to_string()),
            token_url: env_string("FIREBASE_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_FIREBASE_TOKEN_URL.to_string()),
            project_id: env_string("FIREBASE_PROJECT_ID"),
            firestore_url: env_string("FIRESTORE_URL")
                .unwrap_or_else(|| DEFAULT_FIRESTORE_URL.to_string()),
        };

        let db_path = env_string("PITCHSIDE_DB")
            .map(PathBuf::from)
            .or_else(default_db_path);

        let local_admin = match (
            env_string("PITCHSIDE_ADMIN_EMAIL"),
            env_string("PITCHSIDE_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(LocalAdmin { email, password }),
            _ => None,
        };

        Self {
            sports,
            firebase,
            db_path,
            local_admin,
        }
    }

    pub fn uses_firebase_auth(&self) -> bool {
        self.firebase.api_key.is_some()
    }

    pub fn uses_firestore(&self) -> bool {
        self.firebase.project_id.is_some()
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}
