use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CaseError, HarnessError, Result};
use crate::harness::RunState;

/// A runnable benchmark body. Shared so lookups hand out the registered reference.
pub type CaseBody = Arc<dyn Fn(&mut RunState) -> std::result::Result<(), CaseError> + Send + Sync>;

/// A named case as stored in the registry.
#[derive(Clone)]
pub struct BenchmarkCase {
    pub name: String,
    pub body: CaseBody,
}

impl fmt::Debug for BenchmarkCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkCase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Name → body mapping that remembers registration order.
#[derive(Default, Debug)]
pub struct Registry {
    cases: Vec<BenchmarkCase>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, body: F) -> Result<()>
    where
        F: Fn(&mut RunState) -> std::result::Result<(), CaseError> + Send + Sync + 'static,
    {
        self.register_body(name, Arc::new(body))
    }

    pub fn register_body(&mut self, name: impl Into<String>, body: CaseBody) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(HarnessError::DuplicateCaseName(name));
        }
        self.index.insert(name.clone(), self.cases.len());
        self.cases.push(BenchmarkCase { name, body });
        Ok(())
    }

    /// Registered names in registration order. Clone the iterator to restart it.
    pub fn list_cases(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.cases.iter().map(|c| c.name.as_str())
    }

    pub fn get(&self, name: &str) -> Result<&CaseBody> {
        self.index
            .get(name)
            .map(|&i| &self.cases[i].body)
            .ok_or_else(|| HarnessError::CaseNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}
