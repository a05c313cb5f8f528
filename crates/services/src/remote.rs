use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use quiz_core::model::{AggregateStats, AttemptId, AttemptRecord, QuestionDraft, RawId};
use storage::repository::{AttemptRepository, QuestionFeed, StorageError};

use crate::error::RemoteError;

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
}

impl RemoteConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZ_REMOTE_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url = env::var("QUIZ_REMOTE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self { base_url, api_key })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Client for the hosted backend's REST surface (questions, attempts, stats).
#[derive(Clone)]
pub struct RemoteBackend {
    client: Client,
    config: RemoteConfig,
}

impl RemoteBackend {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Backend built from `QUIZ_REMOTE_URL` / `QUIZ_REMOTE_KEY`, if both are set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        RemoteConfig::from_env().map(Self::new)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    /// Check that the service answers a minimal query.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the request fails or the status is not 2xx.
    pub async fn probe(&self) -> Result<(), RemoteError> {
        let url = self.config.endpoint("questions");
        let response = self
            .authorized(self.client.get(url))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        Ok(())
    }

    async fn get_questions(&self) -> Result<Vec<QuestionDraft>, RemoteError> {
        let url = self.config.endpoint("questions");
        let response = self
            .authorized(self.client.get(url))
            .query(&[("select", "*"), ("active", "eq.true"), ("order", "id")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        let rows: Vec<QuestionRow> = response.json().await?;
        Ok(rows.into_iter().map(QuestionRow::into_draft).collect())
    }

    async fn post_attempt(&self, attempt: &AttemptRecord) -> Result<AttemptRecord, RemoteError> {
        let url = self.config.endpoint("attempts");
        let payload = NewAttemptRow {
            score: attempt.score,
            total_seconds: attempt.total_seconds,
        };
        let response = self
            .authorized(self.client.post(url))
            .header("Prefer", "return=representation")
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        let rows: Vec<AttemptRow> = response.json().await?;
        let row = rows.into_iter().next().ok_or(RemoteError::EmptyResponse)?;
        Ok(row.into_record(attempt))
    }

    async fn get_recent(&self, limit: u32) -> Result<Vec<AttemptRecord>, RemoteError> {
        let url = self.config.endpoint("attempts");
        let limit = limit.to_string();
        let response = self
            .authorized(self.client.get(url))
            .query(&[
                ("select", "id,score,created_at,total_seconds"),
                ("order", "created_at.desc"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        let rows: Vec<AttemptRow> = response.json().await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let fallback = AttemptRecord::new(row.score, row.created_at.unwrap_or_else(Utc::now));
                row.into_record(&fallback)
            })
            .collect())
    }

    async fn get_stats(&self) -> Result<AggregateStats, RemoteError> {
        let url = self.config.endpoint("rpc/get_global_stats");
        let response = self
            .authorized(self.client.post(url))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status()));
        }
        let rows: Vec<StatsRow> = response.json().await?;
        match rows.into_iter().next() {
            Some(row) => Ok(row.into_stats()?),
            None => Ok(AggregateStats::zero()),
        }
    }
}

#[async_trait]
impl QuestionFeed for RemoteBackend {
    async fn fetch_questions(&self) -> Result<Vec<QuestionDraft>, StorageError> {
        Ok(self.get_questions().await?)
    }
}

#[async_trait]
impl AttemptRepository for RemoteBackend {
    async fn append_attempt(&self, attempt: AttemptRecord) -> Result<AttemptRecord, StorageError> {
        Ok(self.post_attempt(&attempt).await?)
    }

    async fn recent_attempts(&self, limit: u32) -> Result<Vec<AttemptRecord>, StorageError> {
        Ok(self.get_recent(limit).await?)
    }

    async fn aggregate(&self) -> Result<AggregateStats, StorageError> {
        Ok(self.get_stats().await?)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Err(StorageError::Unsupported)
    }
}

//
// ─── WIRE ROWS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct QuestionRow {
    id: Option<RawId>,
    prompt: Option<String>,
    option_a: Option<String>,
    option_b: Option<String>,
    option_c: Option<String>,
    correct: Option<String>,
}

impl QuestionRow {
    fn into_draft(self) -> QuestionDraft {
        let options: BTreeMap<String, String> = [
            ("A", self.option_a),
            ("B", self.option_b),
            ("C", self.option_c),
        ]
        .into_iter()
        .filter_map(|(label, text)| text.map(|t| (label.to_string(), t)))
        .collect();
        QuestionDraft {
            id: self.id,
            text: self.prompt,
            options,
            correct: self.correct,
        }
    }
}

#[derive(Debug, Serialize)]
struct NewAttemptRow {
    score: u32,
    total_seconds: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AttemptRow {
    id: Option<u64>,
    score: u32,
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    total_seconds: Option<u32>,
}

impl AttemptRow {
    fn into_record(self, sent: &AttemptRecord) -> AttemptRecord {
        AttemptRecord {
            id: self.id.map(AttemptId::new),
            score: self.score,
            recorded_at: self.created_at.unwrap_or(sent.recorded_at),
            total_seconds: self.total_seconds.or(sent.total_seconds),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatsRow {
    #[serde(default)]
    total_attempts: Option<u32>,
    #[serde(default)]
    max_score: Option<u32>,
    #[serde(default)]
    min_score: Option<u32>,
    #[serde(default)]
    avg_score: Option<f64>,
}

impl StatsRow {
    fn into_stats(self) -> Result<AggregateStats, RemoteError> {
        Ok(AggregateStats::from_persisted(
            self.total_attempts.unwrap_or(0),
            self.max_score.unwrap_or(0),
            self.min_score.unwrap_or(0),
            self.avg_score.unwrap_or(0.0),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::AnswerLabel;
    use quiz_core::time::fixed_now;
    use serde_json::json;

    #[test]
    fn question_rows_map_into_valid_drafts() {
        let row: QuestionRow = serde_json::from_value(json!({
            "id": 3,
            "prompt": "Favourite colour?",
            "option_a": "Black",
            "option_b": "Red",
            "option_c": "Green",
            "correct": "A",
            "active": true
        }))
        .unwrap();
        let question = row.into_draft().validate().unwrap();
        assert_eq!(question.correct(), AnswerLabel::A);
        assert_eq!(question.correct_text(), "Black");
        assert_eq!(question.id().map(|id| id.as_str()), Some("3"));
    }

    #[test]
    fn rows_with_null_options_are_rejected_on_validation() {
        let row: QuestionRow = serde_json::from_value(json!({
            "id": 4,
            "prompt": "Incomplete",
            "option_a": "x",
            "option_b": null,
            "option_c": "z",
            "correct": "A"
        }))
        .unwrap();
        assert!(row.into_draft().validate().is_err());
    }

    #[test]
    fn stats_rows_are_checked() {
        let row: StatsRow = serde_json::from_value(json!({
            "total_attempts": 3, "max_score": 90, "min_score": 40, "avg_score": 63.3
        }))
        .unwrap();
        let stats = row.into_stats().unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 40);

        let empty: StatsRow = serde_json::from_value(json!({
            "total_attempts": 0, "max_score": null, "min_score": null, "avg_score": null
        }))
        .unwrap();
        assert!(empty.into_stats().unwrap().is_empty());
    }

    #[test]
    fn attempt_row_keeps_sent_fields_when_reply_omits_them() {
        let sent = AttemptRecord::new(70, fixed_now()).with_total_seconds(Some(55));
        let row: AttemptRow = serde_json::from_value(json!({"id": 12, "score": 70})).unwrap();
        let stored = row.into_record(&sent);
        assert_eq!(stored.id, Some(AttemptId::new(12)));
        assert_eq!(stored.recorded_at, fixed_now());
        assert_eq!(stored.total_seconds, Some(55));
    }

    #[test]
    fn endpoints_join_cleanly() {
        let config = RemoteConfig {
            base_url: "https://example.test/".into(),
            api_key: "k".into(),
        };
        assert_eq!(
            config.endpoint("rpc/get_global_stats"),
            "https://example.test/rest/v1/rpc/get_global_stats"
        );
    }
}
