//! Append-only audit stream of estimation decisions.
//!
//! Each record is hash-chained to its predecessor so tampering is evident.
//! Retention is bounded by entry count; the file sink is append-only JSONL.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::{EstimationOutput, PipelineError};

/// One audit record: enough to reproduce and justify a decision.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub request_hash: String,
    /// region -> snapshot id used for pricing
    pub snapshot_ids: BTreeMap<String, String>,
    pub total_p50: Decimal,
    pub total_p90: Decimal,
    pub carbon_kg_co2e: f64,
    pub confidence: f64,
    pub incomplete: bool,
    pub decision: planguard_types::Decision,
    pub violations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

/// Audit log with bounded in-memory retention and an optional JSONL sink.
pub struct AuditLog {
    entries: RwLock<Vec<AuditRecord>>,
    file: Option<PathBuf>,
    max_entries: usize,
}

impl AuditLog {
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            file: None,
            max_entries,
        }
    }

    pub fn with_file(path: PathBuf, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            file: Some(path),
            max_entries,
        }
    }

    /// Append a record for one completed estimation.
    pub async fn append(
        &self,
        request_hash: String,
        output: &EstimationOutput,
    ) -> Result<AuditRecord, PipelineError> {
        let record = {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| PipelineError::Audit("audit lock poisoned".to_string()))?;

            let previous_hash = entries.last().map(|r| r.entry_hash.clone());
            let record = build_record(request_hash, output, previous_hash);
            entries.push(record.clone());
            // Bounded retention: drop the oldest in-memory entries.
            if entries.len() > self.max_entries {
                let excess = entries.len() - self.max_entries;
                entries.drain(0..excess);
            }
            record
        };

        if let Some(path) = &self.file {
            let line = serde_json::to_string(&record)
                .map_err(|e| PipelineError::Audit(e.to_string()))?;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .map_err(|e| PipelineError::Audit(e.to_string()))?;
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| PipelineError::Audit(e.to_string()))?;
            file.write_all(b"\n")
                .await
                .map_err(|e| PipelineError::Audit(e.to_string()))?;
        }

        Ok(record)
    }

    pub fn entries(&self) -> Vec<AuditRecord> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }
}

fn build_record(
    request_hash: String,
    output: &EstimationOutput,
    previous_hash: Option<String>,
) -> AuditRecord {
    let estimation = &output.estimation;
    let timestamp = Utc::now();
    let violations: Vec<String> = output
        .verdict
        .violations
        .iter()
        .map(|v| format!("{}: {}", v.policy_id, v.message))
        .collect();

    let hash_input = format!(
        "{}{}{}{}{}{:?}{}",
        timestamp.to_rfc3339(),
        request_hash,
        estimation.total_cost_p50,
        estimation.total_cost_p90,
        estimation.confidence,
        output.verdict.decision,
        previous_hash.as_deref().unwrap_or(""),
    );
    let mut hasher = Sha256::new();
    hasher.update(hash_input.as_bytes());
    let entry_hash = hex::encode(hasher.finalize());

    AuditRecord {
        timestamp,
        request_hash,
        snapshot_ids: estimation.audit_trail.snapshots_used.clone(),
        total_p50: estimation.total_cost_p50,
        total_p90: estimation.total_cost_p90,
        carbon_kg_co2e: estimation.carbon_kg_co2e,
        confidence: estimation.confidence,
        incomplete: estimation.incomplete,
        decision: output.verdict.decision,
        violations,
        previous_hash,
        entry_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planguard_types::{EstimationResult, PolicyVerdict};

    fn output() -> EstimationOutput {
        EstimationOutput {
            estimation: EstimationResult::empty("dev", "default"),
            verdict: PolicyVerdict::pass(),
        }
    }

    #[tokio::test]
    async fn records_chain_hashes() {
        let log = AuditLog::in_memory(10);
        let first = log.append("hash-a".to_string(), &output()).await.unwrap();
        let second = log.append("hash-b".to_string(), &output()).await.unwrap();
        assert!(first.previous_hash.is_none());
        assert_eq!(second.previous_hash.as_deref(), Some(first.entry_hash.as_str()));
    }

    #[tokio::test]
    async fn retention_is_bounded() {
        let log = AuditLog::in_memory(2);
        for i in 0..5 {
            log.append(format!("hash-{i}"), &output()).await.unwrap();
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].request_hash, "hash-3");
    }
}
