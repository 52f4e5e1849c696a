//! Scripted fakes for the reasoning and search seams.

use std::sync::Mutex;
use std::time::Duration;

use crate::llm::{Reasoner, ReasoningError};
use crate::provider::{ProviderError, SearchProvider, Source};
use crate::search::prompts::Task;

type Script = Box<dyn Fn(Task, &str) -> Result<String, ReasoningError> + Send + Sync>;

/// Answers each call by routing its system instruction to a [`Task`] and
/// handing the user message to a script. Every user message is recorded.
pub struct ScriptedReasoner {
    script: Script,
    calls: Mutex<Vec<(Task, String)>>,
}

impl ScriptedReasoner {
    pub fn new(
        script: impl Fn(Task, &str) -> Result<String, ReasoningError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// User messages sent for `task`, in call order.
    pub fn calls(&self, task: Task) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == task)
            .map(|(_, user)| user.clone())
            .collect()
    }
}

impl Reasoner for ScriptedReasoner {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ReasoningError> {
        let task = Task::from_system(system).expect("system instruction is not a known task");
        self.calls.lock().unwrap().push((task, user.to_string()));
        (self.script)(task, user)
    }
}

type Lookup = Box<dyn Fn(&str, usize) -> Result<Vec<Source>, ProviderError> + Send + Sync>;

/// A provider answering from a closure and logging every query it receives.
pub struct StubProvider {
    lookup: Lookup,
    queries: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn new(
        lookup: impl Fn(&str, usize) -> Result<Vec<Source>, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            lookup: Box::new(lookup),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl SearchProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Source>, ProviderError> {
        self.queries.lock().unwrap().push(query.to_string());
        (self.lookup)(query, limit)
    }
}

pub fn source(title: &str, link: &str, snippet: &str) -> Source {
    Source {
        title: title.into(),
        link: link.into(),
        snippet: snippet.into(),
    }
}
