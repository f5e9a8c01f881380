use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::workload::WorkloadInfo;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub seed: u64,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
    pub min_time_ns: u128,
    pub repetitions: u32,
    pub workloads: BTreeMap<String, WorkloadInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Failed,
}

/// One report row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub status: Status,

    pub iters: u64,
    pub rounds: u32,
    pub total_ns: u128,
    pub ns_per_iter: f64,

    pub bytes_processed: Option<u64>,
    pub throughput_bytes_per_s: Option<f64>,
    pub fields_converted: Option<u64>,
    pub fields_per_s: Option<f64>,

    pub error_kind: Option<String>,
    pub error: Option<String>,

    pub extra: serde_json::Value,
}

impl ResultRecord {
    pub fn failed(name: impl Into<String>, kind: &str, message: String) -> Self {
        Self {
            name: name.into(),
            status: Status::Failed,
            iters: 0,
            rounds: 0,
            total_ns: 0,
            ns_per_iter: 0.0,
            bytes_processed: None,
            throughput_bytes_per_s: None,
            fields_converted: None,
            fields_per_s: None,
            error_kind: Some(kind.to_string()),
            error: Some(message),
            extra: serde_json::Value::Null,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub run: RunMeta,
    pub results: Vec<ResultRecord>,
}
