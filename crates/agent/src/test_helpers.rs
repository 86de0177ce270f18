//! Shared test helpers for loop tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stepwise_core::{Backend, BackendError};

/// A backend that replays scripted outcomes and records every prompt.
///
/// Once the script runs out, the last outcome repeats.
pub struct ScriptedBackend {
    script: Vec<Result<String, BackendError>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<String, BackendError>>) -> Arc<Self> {
        assert!(!script.is_empty(), "ScriptedBackend needs at least one outcome");
        Arc::new(Self {
            script,
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Script made only of successful replies.
    pub fn replies<'a>(replies: impl IntoIterator<Item = &'a str>) -> Arc<Self> {
        Self::new(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let mut prompts = self.prompts.lock().unwrap();
        let idx = prompts.len().min(self.script.len() - 1);
        prompts.push(prompt.to_string());
        self.script[idx].clone()
    }
}
