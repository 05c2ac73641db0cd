use std::collections::HashSet;
use std::fmt;

use crate::engine::errors::{ExecResult, ExecutionError, RemoteError};
use crate::engine::remote::RemoteSession;

/// One dataset's remote session plus the schema facts the core consults.
pub struct DatasetSession {
    pub display_name: String,
    pub remote: Box<dyn RemoteSession>,
    pub int_fields: HashSet<String>,
    pub string_fields: HashSet<String>,
    /// Int field holding each document's timestamp in seconds.
    pub time_field: String,
}

impl DatasetSession {
    pub fn new(display_name: impl Into<String>, remote: Box<dyn RemoteSession>) -> Self {
        Self {
            display_name: display_name.into(),
            remote,
            int_fields: HashSet::new(),
            string_fields: HashSet::new(),
            time_field: "unixtime".to_string(),
        }
    }

    pub fn with_int_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.int_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_string_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.string_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_time_field(mut self, field: impl Into<String>) -> Self {
        self.time_field = field.into();
        self
    }

    pub fn is_int_field(&self, field: &str) -> bool {
        self.int_fields.contains(field)
    }

    pub fn is_string_field(&self, field: &str) -> bool {
        self.string_fields.contains(field)
    }

    /// Pushes `pushes` as the only stat on this session, runs `f` against
    /// it as stat 0 and pops it again.
    pub fn with_single_stat<T>(
        &mut self,
        pushes: &[String],
        f: impl FnOnce(&mut dyn RemoteSession) -> Result<T, RemoteError>,
    ) -> ExecResult<T> {
        let num_stats = self.remote.push_stats(pushes)?;
        if num_stats != 1 {
            self.remote.pop_stat()?;
            return Err(ExecutionError::UnexpectedStatCount {
                session: self.display_name.clone(),
                expected: 1,
                actual: num_stats,
            });
        }
        let result = f(self.remote.as_mut());
        self.remote.pop_stat()?;
        Ok(result?)
    }
}

impl fmt::Debug for DatasetSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetSession")
            .field("display_name", &self.display_name)
            .field("num_stats", &self.remote.num_stats())
            .field("int_fields", &self.int_fields)
            .field("string_fields", &self.string_fields)
            .field("time_field", &self.time_field)
            .finish()
    }
}
