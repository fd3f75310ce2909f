//! Versioned cache store operations.
//!
//! A cache store is a named mapping from request identity (method + URL) to a
//! stored response. Stores are never expired entry by entry: the gateway
//! deletes whole stores when the version changes or on an explicit clear.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, Transaction};

/// A stored response, as kept in a cache store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CachedResponse {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

/// Identity of an entry in a cache store, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

fn insert_entry(tx: &Transaction<'_>, cache_name: &str, response: &CachedResponse) -> Result<(), Error> {
    let key = compute_request_key(&response.method, &response.url);
    let headers_json = serde_json::to_string(&response.headers)?;

    tx.execute(
        "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
        params![cache_name, chrono::Utc::now().to_rfc3339()],
    )?;
    tx.execute(
        "INSERT INTO cache_entries (cache_name, key, url, method, status, headers_json, body, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(cache_name, key) DO UPDATE SET
            url = excluded.url,
            method = excluded.method,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            cache_name,
            key,
            &response.url,
            response.method.to_ascii_uppercase(),
            response.status,
            headers_json,
            &response.body,
            &response.stored_at,
        ],
    )?;
    tx.execute(
        "INSERT INTO cache_metadata (url, cache_name, status, stored_at) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(url) DO UPDATE SET
            cache_name = excluded.cache_name,
            status = excluded.status,
            stored_at = excluded.stored_at",
        params![&response.url, cache_name, response.status, &response.stored_at],
    )?;
    Ok(())
}

impl CacheDb {
    /// Create the named store if it does not exist yet.
    pub async fn open_store(&self, cache_name: &str) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![cache_name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace a response in the named store.
    ///
    /// Opens the store if needed. Concurrent writers to the same key resolve
    /// last-writer-wins.
    pub async fn put_response(&self, cache_name: &str, response: &CachedResponse) -> Result<(), Error> {
        self.put_responses(cache_name, std::slice::from_ref(response)).await
    }

    /// Insert a batch of responses atomically: either all are stored or none.
    pub async fn put_responses(&self, cache_name: &str, responses: &[CachedResponse]) -> Result<(), Error> {
        let cache_name = cache_name.to_string();
        let responses = responses.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for response in &responses {
                    insert_entry(&tx, &cache_name, response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for a request in the named store.
    ///
    /// Returns None on a cache miss.
    pub async fn match_response(&self, cache_name: &str, method: &str, url: &str) -> Result<Option<CachedResponse>, Error> {
        let cache_name = cache_name.to_string();
        let key = compute_request_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let row = conn
                    .query_row(
                        "SELECT url, method, status, headers_json, body, stored_at
                        FROM cache_entries WHERE cache_name = ?1 AND key = ?2",
                        params![cache_name, key],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, u16>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, Vec<u8>>(4)?,
                                row.get::<_, String>(5)?,
                            ))
                        },
                    )
                    .optional()?;

                match row {
                    Some((url, method, status, headers_json, body, stored_at)) => Ok(Some(CachedResponse {
                        url,
                        method,
                        status,
                        headers: serde_json::from_str(&headers_json)?,
                        body,
                        stored_at,
                    })),
                    None => Ok(None),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// List the request identities held in the named store, oldest first.
    pub async fn store_keys(&self, cache_name: &str) -> Result<Vec<CacheKey>, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<CacheKey>, Error> {
                let mut stmt =
                    conn.prepare("SELECT method, url FROM cache_entries WHERE cache_name = ?1 ORDER BY rowid ASC")?;
                let keys = stmt
                    .query_map(params![cache_name], |row| Ok(CacheKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Count the entries in the named store.
    pub async fn count_entries(&self, cache_name: &str) -> Result<u64, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE cache_name = ?1",
                    params![cache_name],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every existing store.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a whole store together with its entries and metadata.
    ///
    /// Returns whether the store existed.
    pub async fn delete_store(&self, cache_name: &str) -> Result<bool, Error> {
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM cache_entries WHERE cache_name = ?1", params![cache_name])?;
                // metadata follows a surviving copy of the URL if another store still holds one
                tx.execute(
                    "INSERT INTO cache_metadata (url, cache_name, status, stored_at)
                    SELECT url, cache_name, status, stored_at FROM cache_entries
                    WHERE url IN (SELECT url FROM cache_metadata WHERE cache_name = ?1)
                    ON CONFLICT(url) DO UPDATE SET
                        cache_name = excluded.cache_name,
                        status = excluded.status,
                        stored_at = excluded.stored_at",
                    params![cache_name],
                )?;
                tx.execute("DELETE FROM cache_metadata WHERE cache_name = ?1", params![cache_name])?;
                let deleted = tx.execute("DELETE FROM cache_stores WHERE name = ?1", params![cache_name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
