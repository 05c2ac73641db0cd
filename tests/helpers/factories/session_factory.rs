use std::collections::{BTreeMap, HashMap};

use crate::engine::errors::RemoteError;
use crate::engine::session::{DatasetSession, Session, SessionOptions};
use crate::shared::format::OutputFormat;
use crate::test_helpers::memory_remote::{CallLog, MemoryDocument, MemoryRemoteSession};

/// Builds a `Session` over in-memory datasets. Field kinds are taken from
/// the documents themselves.
pub struct SessionFactory {
    datasets: BTreeMap<String, Vec<MemoryDocument>>,
    failures: HashMap<String, (String, RemoteError)>,
    options: SessionOptions,
}

impl SessionFactory {
    pub fn new() -> Self {
        Self {
            datasets: BTreeMap::new(),
            failures: HashMap::new(),
            options: SessionOptions::default(),
        }
    }

    pub fn with_dataset(mut self, name: &str, docs: Vec<MemoryDocument>) -> Self {
        self.datasets.insert(name.to_string(), docs);
        self
    }

    pub fn with_group_limit(mut self, limit: usize) -> Self {
        self.options = self.options.with_group_limit(limit);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.options = self.options.with_output_format(format);
        self
    }

    pub fn with_sorted_iteration(mut self) -> Self {
        self.options.sorted_iteration = true;
        self
    }

    /// Makes the first `call` on `dataset` fail with `error`.
    pub fn failing(mut self, dataset: &str, call: &str, error: RemoteError) -> Self {
        self.failures
            .insert(dataset.to_string(), (call.to_string(), error));
        self
    }

    pub fn create(self) -> Session {
        self.create_with_logs().0
    }

    pub fn create_with_logs(mut self) -> (Session, BTreeMap<String, CallLog>) {
        let mut logs = BTreeMap::new();
        let mut datasets = BTreeMap::new();
        for (name, docs) in self.datasets {
            let mut int_fields = Vec::new();
            let mut string_fields = Vec::new();
            for doc in &docs {
                int_fields.extend(doc.int_fields.keys().cloned());
                string_fields.extend(doc.string_fields.keys().cloned());
            }
            let log = CallLog::default();
            let mut remote = MemoryRemoteSession::new(docs).with_log(log.clone());
            if let Some((call, error)) = self.failures.remove(&name) {
                remote = remote.failing_on(&call, error);
            }
            let dataset = DatasetSession::new(name.clone(), Box::new(remote))
                .with_int_fields(int_fields)
                .with_string_fields(string_fields);
            logs.insert(name.clone(), log);
            datasets.insert(name, dataset);
        }
        (Session::new(datasets, self.options), logs)
    }
}
