//! Environment-derived configuration: `HYDRA_DB_PATH`, `HYDRA_SESSION_ID`,
//! `SCBE_URL`.

use std::path::PathBuf;

pub struct Config {
    pub db_path: PathBuf,
    pub session_id: Option<String>,
    pub scbe_url: Option<String>,
}

impl Config {
    pub fn load(scbe_url_flag: Option<String>) -> Self {
        let db_path = std::env::var("HYDRA_DB_PATH").map(PathBuf::from).unwrap_or_else(|_| default_db_path());
        let session_id = std::env::var("HYDRA_SESSION_ID").ok();
        let scbe_url = scbe_url_flag.or_else(|| std::env::var("SCBE_URL").ok());
        Self {
            db_path,
            session_id,
            scbe_url,
        }
    }
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".hydra").join("ledger.db")
}
