//! Cache metadata and user preference collections.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// Last write recorded for a cached URL.
///
/// Upserted alongside every cache store write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheMetadata {
    pub url: String,
    pub cache_name: String,
    pub status: u16,
    pub stored_at: String,
}

impl CacheDb {
    /// Metadata for a cached URL, if any store holds it.
    pub async fn cache_metadata(&self, url: &str) -> Result<Option<CacheMetadata>, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheMetadata>, Error> {
                let meta = conn
                    .query_row(
                        "SELECT url, cache_name, status, stored_at FROM cache_metadata WHERE url = ?1",
                        params![url],
                        |row| {
                            Ok(CacheMetadata {
                                url: row.get(0)?,
                                cache_name: row.get(1)?,
                                status: row.get(2)?,
                                stored_at: row.get(3)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(meta)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn get_preference(&self, key: &str) -> Result<Option<serde_json::Value>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<serde_json::Value>, Error> {
                let raw: Option<String> = conn
                    .query_row("SELECT value_json FROM user_preferences WHERE key = ?1", params![key], |row| {
                        row.get(0)
                    })
                    .optional()?;
                raw.map(|json| serde_json::from_str(&json).map_err(Error::from))
                    .transpose()
            })
            .await
            .map_err(Error::from)
    }

    pub async fn set_preference(&self, key: &str, value: &serde_json::Value) -> Result<(), Error> {
        let key = key.to_string();
        let value_json = serde_json::to_string(value)?;
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO user_preferences (key, value_json, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value_json = excluded.value_json,
                        updated_at = excluded.updated_at",
                    params![key, value_json, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
