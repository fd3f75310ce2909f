//! Pending submission queues.
//!
//! Contact forms and bookings made while the network is unreachable are
//! queued here and drained by background sync. A record is deleted only after
//! its retry succeeded.

use super::connection::CacheDb;
use super::hash::generate_submission_id;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Which queue a submission belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionKind {
    ContactForm,
    Booking,
}

impl SubmissionKind {
    /// Name of the backing collection.
    pub fn collection(self) -> &'static str {
        match self {
            SubmissionKind::ContactForm => "contact-forms",
            SubmissionKind::Booking => "bookings",
        }
    }
}

/// A queued submission awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PendingSubmission {
    pub id: String,
    pub data: serde_json::Value,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl CacheDb {
    /// Queue a new submission, stamped with the current time.
    pub async fn queue_submission(&self, kind: SubmissionKind, data: serde_json::Value) -> Result<PendingSubmission, Error> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let submission = PendingSubmission { id: generate_submission_id(), data, timestamp };
        self.insert_submission(kind, &submission).await?;
        Ok(submission)
    }

    /// Store a submission record as-is, replacing one with the same id.
    pub async fn insert_submission(&self, kind: SubmissionKind, submission: &PendingSubmission) -> Result<(), Error> {
        let collection = kind.collection();
        let id = submission.id.clone();
        let data_json = serde_json::to_string(&submission.data)?;
        let timestamp = submission.timestamp;
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO pending_submissions (collection, id, data_json, timestamp)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(collection, id) DO UPDATE SET
                        data_json = excluded.data_json,
                        timestamp = excluded.timestamp",
                    params![collection, id, data_json, timestamp],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All queued submissions of a kind, in creation order.
    pub async fn list_submissions(&self, kind: SubmissionKind) -> Result<Vec<PendingSubmission>, Error> {
        let collection = kind.collection();
        self.conn
            .call(move |conn| -> Result<Vec<PendingSubmission>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT id, data_json, timestamp FROM pending_submissions
                    WHERE collection = ?1 ORDER BY timestamp ASC, seq ASC",
                )?;
                let rows = stmt
                    .query_map(params![collection], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;

                rows.into_iter()
                    .map(|(id, data_json, timestamp)| -> Result<PendingSubmission, Error> {
                        Ok(PendingSubmission { id, data: serde_json::from_str(&data_json)?, timestamp })
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a delivered submission. Returns whether it was present.
    pub async fn delete_submission(&self, kind: SubmissionKind, id: &str) -> Result<bool, Error> {
        let collection = kind.collection();
        let id = id.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM pending_submissions WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
