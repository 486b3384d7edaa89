//! Prometheus counters for admissions and commits

use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};

pub struct SyncMetrics {
    registry: Registry,
    admissions: IntCounterVec,
    commits: IntCounterVec,
}

impl SyncMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let admissions = IntCounterVec::new(
            Opts::new("sdn_sync_admissions_total", "Admission decisions by resource, operation and status"),
            &["resource", "operation", "status"],
        )?;
        let commits = IntCounterVec::new(
            Opts::new("sdn_sync_commits_total", "Commit outcomes by resource, operation and terminal state"),
            &["resource", "operation", "state"],
        )?;
        registry.register(Box::new(admissions.clone()))?;
        registry.register(Box::new(commits.clone()))?;
        Ok(Self {
            registry,
            admissions,
            commits,
        })
    }

    pub fn admission(&self, resource: &str, operation: &str, status: u16) {
        let status = status.to_string();
        self.admissions
            .with_label_values(&[resource, operation, status.as_str()])
            .inc();
    }

    pub fn commit(&self, resource: &str, operation: &str, state: &str) {
        self.commits.with_label_values(&[resource, operation, state]).inc();
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
