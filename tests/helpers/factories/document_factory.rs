use rand::Rng;
use serde_json::{Value, json};
use std::collections::HashMap;

use crate::test_helpers::memory_remote::MemoryDocument;

/// Builds documents from JSON values: integers become int fields, strings
/// become string fields, arrays become multi-valued fields.
pub struct DocumentFactory {
    params: HashMap<String, Value>,
}

impl DocumentFactory {
    pub fn new() -> Self {
        let mut params = HashMap::new();
        params.insert("unixtime".into(), json!(1_700_000_000));
        params.insert("country".into(), json!("us"));
        params.insert("clicks".into(), json!(1));
        Self { params }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.params.remove(key);
        self
    }

    pub fn create(self) -> MemoryDocument {
        let mut doc = MemoryDocument::default();
        for (key, value) in &self.params {
            let values = match value {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            for item in values {
                match item {
                    Value::Number(n) => doc
                        .int_fields
                        .entry(key.clone())
                        .or_default()
                        .push(n.as_i64().unwrap()),
                    Value::String(s) => doc.string_fields.entry(key.clone()).or_default().push(s),
                    other => panic!("unsupported document value {:?}", other),
                }
            }
        }
        doc
    }

    /// `count` copies, each with a random `clicks` between 0 and 9 unless the
    /// factory fixed one and an `index` int field.
    pub fn create_list(self, count: usize) -> Vec<MemoryDocument> {
        let mut rng = rand::thread_rng();
        (0..count)
            .map(|i| {
                let mut params = self.params.clone();
                params.insert("index".into(), json!(i));
                params
                    .entry("clicks".into())
                    .or_insert_with(|| json!(rng.gen_range(0..10)));
                DocumentFactory { params }.create()
            })
            .collect()
    }
}
