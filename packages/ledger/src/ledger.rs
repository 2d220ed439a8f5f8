//! The append-only Ledger: durable action/decision history, head/limb
//! lifecycle, and cross-session memory, backed by SQLite.
//!
//! Grounded in the source system's ledger implementation: table shapes,
//! query ordering, and the upsert-based memory/keyword operations mirror
//! that design; the signature scheme is strengthened from a plain keyed
//! SHA-256 hash to an HMAC-SHA256 MAC over the same canonical subset,
//! truncated to 128 bits as the spec requires.

use crate::error::LedgerError;
use crate::types::{EntryType, LedgerEntry, LedgerStats, MemoryFact, NewLedgerEntry, QueryFilter, VerificationReport};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub struct Ledger {
    pool: SqlitePool,
    session_id: String,
    secret: Vec<u8>,
    /// The Ledger's own writer lock (held only across the INSERT).
    write_lock: Mutex<()>,
    /// In-memory cache of the durable `keywords` table, rehydrated at open.
    keyword_cache: RwLock<HashMap<String, HashSet<String>>>,
}

impl Ledger {
    /// Open (creating if absent) a SQLite-backed ledger at `db_path`.
    pub async fn open(db_path: &Path, session_id: Option<String>) -> Result<Arc<Self>, LedgerError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
            .map_err(LedgerError::Storage)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let session_id = session_id.unwrap_or_else(Self::generate_session_id);
        let secret = Self::derive_secret(&session_id);

        let ledger = Self {
            pool,
            session_id,
            secret,
            write_lock: Mutex::new(()),
            keyword_cache: RwLock::new(HashMap::new()),
        };
        ledger.init_schema().await?;
        ledger.rehydrate_keywords().await?;

        tracing::info!(session_id = %ledger.session_id, path = %db_path.display(), "ledger opened");
        Ok(Arc::new(ledger))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn generate_session_id() -> String {
        let ts = Utc::now().format("%Y%m%d-%H%M%S");
        let mut bytes = [0u8; 4];
        rand::rng().fill_bytes(&mut bytes);
        format!("session-{ts}-{}", hex::encode(bytes))
    }

    /// Deterministic per-session signing key, so a ledger reopened with
    /// the same `session_id` (e.g. `HYDRA_SESSION_ID` fixed across
    /// restarts) still verifies entries written in a prior process
    /// lifetime.
    fn derive_secret(session_id: &str) -> Vec<u8> {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(b"hydra-ledger-signing-key:");
        hasher.update(session_id.as_bytes());
        hasher.finalize().to_vec()
    }

    async fn init_schema(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger (
                id TEXT PRIMARY KEY,
                entry_type TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                head_id TEXT,
                limb_id TEXT,
                action TEXT NOT NULL,
                target TEXT,
                payload TEXT,
                decision TEXT,
                score REAL,
                parent_id TEXT,
                session_id TEXT NOT NULL,
                signature TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for stmt in [
            "CREATE INDEX IF NOT EXISTS idx_ledger_session_ts ON ledger(session_id, timestamp)",
            "CREATE INDEX IF NOT EXISTS idx_ledger_type ON ledger(entry_type)",
            "CREATE INDEX IF NOT EXISTS idx_ledger_head ON ledger(head_id)",
            "CREATE INDEX IF NOT EXISTS idx_ledger_limb ON ledger(limb_id)",
            "CREATE INDEX IF NOT EXISTS idx_ledger_decision ON ledger(decision)",
        ] {
            sqlx::query(stmt).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS memory (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT 'general',
                importance REAL NOT NULL DEFAULT 0.5,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                access_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS active_heads (
                head_id TEXT PRIMARY KEY,
                ai_type TEXT,
                model TEXT,
                connected_at TEXT,
                status TEXT NOT NULL DEFAULT 'active'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS active_limbs (
                limb_id TEXT PRIMARY KEY,
                limb_type TEXT,
                activated_at TEXT,
                status TEXT NOT NULL DEFAULT 'active'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS keywords (
                keyword TEXT NOT NULL,
                memory_key TEXT NOT NULL,
                PRIMARY KEY (keyword, memory_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn compute_signature(&self, id: &str, entry_type: &str, action: &str, target: &str) -> String {
        let canonical = format!("{id}:{entry_type}:{action}:{target}");
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(canonical.as_bytes());
        let digest = mac.finalize().into_bytes();
        hex::encode(digest)[..32].to_string()
    }

    /// Recompute and compare an entry's signature against the Ledger's key.
    pub fn verify(&self, entry: &LedgerEntry) -> bool {
        let expected = self.compute_signature(&entry.id, entry.entry_type.as_str(), &entry.action, &entry.target);
        expected == entry.signature
    }

    /// `Write(entry)`. Writer-lock held only across the INSERT.
    pub async fn write(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, LedgerError> {
        let id = Uuid::new_v4().to_string();
        let timestamp = Utc::now();
        let signature = self.compute_signature(&id, entry.entry_type.as_str(), &entry.action, &entry.target);
        let payload_text = serde_json::to_string(&entry.payload)?;

        let record = LedgerEntry {
            id,
            entry_type: entry.entry_type,
            timestamp,
            head_id: entry.head_id,
            limb_id: entry.limb_id,
            action: entry.action,
            target: entry.target,
            payload: entry.payload,
            decision: entry.decision,
            score: entry.score,
            parent_id: entry.parent_id,
            session_id: self.session_id.clone(),
            signature,
        };

        {
            let _guard = self.write_lock.lock().await;
            sqlx::query(
                r#"
                INSERT INTO ledger (
                    id, entry_type, timestamp, head_id, limb_id,
                    action, target, payload, decision, score,
                    parent_id, session_id, signature
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.id)
            .bind(record.entry_type.as_str())
            .bind(record.timestamp.to_rfc3339())
            .bind(&record.head_id)
            .bind(&record.limb_id)
            .bind(&record.action)
            .bind(&record.target)
            .bind(&payload_text)
            .bind(&record.decision)
            .bind(record.score)
            .bind(&record.parent_id)
            .bind(&record.session_id)
            .bind(&record.signature)
            .execute(&self.pool)
            .await?;
        }

        tracing::debug!(
            id = %record.id,
            entry_type = record.entry_type.as_str(),
            action = %record.action,
            "ledger entry written"
        );
        Ok(record)
    }

    pub async fn read(&self, id: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let row = sqlx::query("SELECT * FROM ledger WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Self::row_to_entry(&r)))
    }

    pub async fn query(&self, filter: QueryFilter, limit: i64, offset: i64) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut sql = String::from("SELECT * FROM ledger WHERE 1=1");
        if filter.entry_type.is_some() {
            sql.push_str(" AND entry_type = ?");
        }
        if filter.head_id.is_some() {
            sql.push_str(" AND head_id = ?");
        }
        if filter.limb_id.is_some() {
            sql.push_str(" AND limb_id = ?");
        }
        if filter.decision.is_some() {
            sql.push_str(" AND decision = ?");
        }
        if filter.session_id.is_some() {
            sql.push_str(" AND session_id = ?");
        }
        sql.push_str(" ORDER BY timestamp DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql);
        if let Some(et) = &filter.entry_type {
            query = query.bind(et.as_str());
        }
        if let Some(h) = &filter.head_id {
            query = query.bind(h);
        }
        if let Some(l) = &filter.limb_id {
            query = query.bind(l);
        }
        if let Some(d) = &filter.decision {
            query = query.bind(d);
        }
        if let Some(s) = &filter.session_id {
            query = query.bind(s);
        }
        let rows = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::row_to_entry).collect())
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> LedgerEntry {
        let entry_type: String = row.get("entry_type");
        let timestamp: String = row.get("timestamp");
        let payload: Option<String> = row.get("payload");
        LedgerEntry {
            id: row.get("id"),
            entry_type: EntryType::parse(&entry_type).unwrap_or(EntryType::Error),
            timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            head_id: row.get("head_id"),
            limb_id: row.get("limb_id"),
            action: row.get("action"),
            target: row.get("target"),
            payload: payload
                .and_then(|p| serde_json::from_str(&p).ok())
                .unwrap_or(serde_json::json!({})),
            decision: row.get("decision"),
            score: row.get("score"),
            parent_id: row.get("parent_id"),
            session_id: row.get("session_id"),
            signature: row.get("signature"),
        }
    }

    /// A full verification pass: reports failing ids, does not repair.
    pub async fn verify_all(&self) -> Result<VerificationReport, LedgerError> {
        let rows = sqlx::query("SELECT * FROM ledger").fetch_all(&self.pool).await?;
        let mut report = VerificationReport::default();
        for row in &rows {
            let entry = Self::row_to_entry(row);
            report.checked += 1;
            if !self.verify(&entry) {
                report.failed_ids.push(entry.id);
            }
        }
        Ok(report)
    }

    // -- memory -----------------------------------------------------------

    pub async fn remember(&self, key: &str, value: serde_json::Value, category: &str, importance: f64) -> Result<(), LedgerError> {
        let now = Utc::now().to_rfc3339();
        let value_text = serde_json::to_string(&value)?;
        sqlx::query(
            r#"
            INSERT INTO memory (key, value, category, importance, created_at, updated_at, access_count)
            VALUES (?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                category = excluded.category,
                importance = excluded.importance,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(&value_text)
        .bind(category)
        .bind(importance)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        for token in Self::index_tokens(key) {
            self.save_keyword(&token, key).await?;
        }
        Ok(())
    }

    pub async fn recall(&self, key: &str) -> Result<Option<serde_json::Value>, LedgerError> {
        sqlx::query("UPDATE memory SET access_count = access_count + 1 WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        let row = sqlx::query("SELECT value FROM memory WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let value: String = row.get("value");
                Ok(Some(serde_json::from_str(&value)?))
            }
            None => Ok(None),
        }
    }

    pub async fn search_memory(&self, pattern: Option<&str>, category: Option<&str>, limit: i64) -> Result<Vec<MemoryFact>, LedgerError> {
        let mut sql = String::from("SELECT * FROM memory WHERE 1=1");
        if pattern.is_some() {
            sql.push_str(" AND (key LIKE ? OR value LIKE ?)");
        }
        if category.is_some() {
            sql.push_str(" AND category = ?");
        }
        sql.push_str(" ORDER BY importance DESC, access_count DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(p) = pattern {
            let like = format!("%{p}%");
            query = query.bind(like.clone()).bind(like);
        }
        if let Some(c) = category {
            query = query.bind(c);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let value: String = row.get("value");
                let created_at: String = row.get("created_at");
                let updated_at: String = row.get("updated_at");
                Ok(MemoryFact {
                    key: row.get("key"),
                    value: serde_json::from_str(&value)?,
                    category: row.get("category"),
                    importance: row.get("importance"),
                    created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    access_count: row.get("access_count"),
                })
            })
            .collect()
    }

    fn index_tokens(key: &str) -> HashSet<String> {
        key.split(|c: char| !c.is_alphanumeric())
            .map(|t| t.to_ascii_lowercase())
            .filter(|t| t.len() > 2)
            .collect()
    }

    /// Insert-or-ignore into the durable keyword reverse index, idempotent.
    pub async fn save_keyword(&self, keyword: &str, memory_key: &str) -> Result<(), LedgerError> {
        sqlx::query("INSERT OR IGNORE INTO keywords (keyword, memory_key) VALUES (?, ?)")
            .bind(keyword)
            .bind(memory_key)
            .execute(&self.pool)
            .await?;
        self.keyword_cache
            .write()
            .await
            .entry(keyword.to_string())
            .or_default()
            .insert(memory_key.to_string());
        Ok(())
    }

    /// Durable reverse index is the source of truth; this also refreshes
    /// the in-memory cache consulted by keyword search.
    pub async fn load_keywords(&self) -> Result<HashMap<String, Vec<String>>, LedgerError> {
        let rows = sqlx::query("SELECT keyword, memory_key FROM keywords")
            .fetch_all(&self.pool)
            .await?;
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let keyword: String = row.get("keyword");
            let memory_key: String = row.get("memory_key");
            map.entry(keyword).or_default().push(memory_key);
        }
        Ok(map)
    }

    async fn rehydrate_keywords(&self) -> Result<(), LedgerError> {
        let loaded = self.load_keywords().await?;
        let mut cache = self.keyword_cache.write().await;
        for (keyword, keys) in loaded {
            cache.entry(keyword).or_default().extend(keys);
        }
        Ok(())
    }

    /// Keyword-to-memory-key index, seeded from the durable table at open.
    pub async fn keyword_cache_snapshot(&self) -> HashMap<String, HashSet<String>> {
        self.keyword_cache.read().await.clone()
    }

    // -- head / limb registry persistence ----------------------------------

    pub async fn register_head(&self, head_id: &str, ai_type: &str, model: &str) -> Result<(), LedgerError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO active_heads (head_id, ai_type, model, connected_at, status)
            VALUES (?, ?, ?, ?, 'active')
            ON CONFLICT(head_id) DO UPDATE SET status = 'active', connected_at = excluded.connected_at
            "#,
        )
        .bind(head_id)
        .bind(ai_type)
        .bind(model)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn unregister_head(&self, head_id: &str) -> Result<(), LedgerError> {
        sqlx::query("UPDATE active_heads SET status = 'disconnected' WHERE head_id = ?")
            .bind(head_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_active_heads(&self) -> Result<Vec<(String, String, String)>, LedgerError> {
        let rows = sqlx::query("SELECT head_id, ai_type, model FROM active_heads WHERE status = 'active'")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("head_id"), r.get("ai_type"), r.get("model")))
            .collect())
    }

    pub async fn register_limb(&self, limb_id: &str, limb_type: &str) -> Result<(), LedgerError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO active_limbs (limb_id, limb_type, activated_at, status)
            VALUES (?, ?, ?, 'active')
            ON CONFLICT(limb_id) DO UPDATE SET status = 'active', activated_at = excluded.activated_at
            "#,
        )
        .bind(limb_id)
        .bind(limb_type)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn deactivate_limb(&self, limb_id: &str) -> Result<(), LedgerError> {
        sqlx::query("UPDATE active_limbs SET status = 'inactive' WHERE limb_id = ?")
            .bind(limb_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_active_limbs(&self) -> Result<Vec<(String, String)>, LedgerError> {
        let rows = sqlx::query("SELECT limb_id, limb_type FROM active_limbs WHERE status = 'active'")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|r| (r.get("limb_id"), r.get("limb_type"))).collect())
    }

    pub async fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let total: i64 = sqlx::query("SELECT COUNT(*) AS c FROM ledger")
            .fetch_one(&self.pool)
            .await?
            .get("c");

        let mut by_entry_type = BTreeMap::new();
        let rows = sqlx::query("SELECT entry_type, COUNT(*) AS c FROM ledger GROUP BY entry_type")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            by_entry_type.insert(row.get::<String, _>("entry_type"), row.get::<i64, _>("c"));
        }

        let mut by_decision = BTreeMap::new();
        let rows = sqlx::query("SELECT decision, COUNT(*) AS c FROM ledger WHERE decision IS NOT NULL GROUP BY decision")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            by_decision.insert(row.get::<String, _>("decision"), row.get::<i64, _>("c"));
        }

        let active_heads: i64 = sqlx::query("SELECT COUNT(*) AS c FROM active_heads WHERE status = 'active'")
            .fetch_one(&self.pool)
            .await?
            .get("c");
        let active_limbs: i64 = sqlx::query("SELECT COUNT(*) AS c FROM active_limbs WHERE status = 'active'")
            .fetch_one(&self.pool)
            .await?
            .get("c");
        let memory_facts: i64 = sqlx::query("SELECT COUNT(*) AS c FROM memory")
            .fetch_one(&self.pool)
            .await?
            .get("c");

        Ok(LedgerStats {
            total_entries: total,
            by_entry_type,
            by_decision,
            active_heads,
            active_limbs,
            memory_facts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewLedgerEntry;

    async fn open_test_ledger() -> (Arc<Ledger>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let ledger = Ledger::open(&path, Some("test-session".to_string())).await.unwrap();
        (ledger, dir)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (ledger, _dir) = open_test_ledger().await;
        let entry = NewLedgerEntry::new(EntryType::Action, "navigate", "https://example.com");
        let written = ledger.write(entry).await.unwrap();
        let read = ledger.read(&written.id).await.unwrap().unwrap();
        assert_eq!(read.action, "navigate");
        assert_eq!(read.session_id, "test-session");
    }

    #[tokio::test]
    async fn written_entries_verify() {
        let (ledger, _dir) = open_test_ledger().await;
        let entry = NewLedgerEntry::new(EntryType::Decision, "click", "button#submit");
        let written = ledger.write(entry).await.unwrap();
        assert!(ledger.verify(&written));
    }

    #[tokio::test]
    async fn reopening_with_the_same_session_id_still_verifies_old_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let first = Ledger::open(&path, Some("fixed-session".to_string())).await.unwrap();
        let written = first
            .write(NewLedgerEntry::new(EntryType::Action, "navigate", "https://example.com"))
            .await
            .unwrap();
        drop(first);

        let reopened = Ledger::open(&path, Some("fixed-session".to_string())).await.unwrap();
        let reread = reopened.read(&written.id).await.unwrap().unwrap();
        assert!(reopened.verify(&reread));
    }

    #[tokio::test]
    async fn ledger_is_append_only_count_never_drops() {
        let (ledger, _dir) = open_test_ledger().await;
        for i in 0..5 {
            ledger
                .write(NewLedgerEntry::new(EntryType::Action, "navigate", format!("https://example.com/{i}")))
                .await
                .unwrap();
        }
        let stats = ledger.stats().await.unwrap();
        assert_eq!(stats.total_entries, 5);
    }

    #[tokio::test]
    async fn remember_recall_round_trips() {
        let (ledger, _dir) = open_test_ledger().await;
        ledger
            .remember("project", serde_json::json!("scbe"), "general", 0.5)
            .await
            .unwrap();
        let value = ledger.recall("project").await.unwrap();
        assert_eq!(value, Some(serde_json::json!("scbe")));
    }

    #[tokio::test]
    async fn keyword_index_seeds_from_remember() {
        let (ledger, _dir) = open_test_ledger().await;
        ledger
            .remember("project_name", serde_json::json!("hydra"), "general", 0.5)
            .await
            .unwrap();
        let keywords = ledger.load_keywords().await.unwrap();
        assert!(keywords.contains_key("project"));
    }

    #[tokio::test]
    async fn head_lifecycle_tracks_active_status() {
        let (ledger, _dir) = open_test_ledger().await;
        ledger.register_head("head-1", "llm", "gpt").await.unwrap();
        assert_eq!(ledger.get_active_heads().await.unwrap().len(), 1);
        ledger.unregister_head("head-1").await.unwrap();
        assert_eq!(ledger.get_active_heads().await.unwrap().len(), 0);
    }
}
