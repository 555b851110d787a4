//! Shared test doubles for the request pipeline and the companion loop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::generator::{GeneratorError, ResponseGenerator};

enum Script {
    Reply(String),
    Echo,
    Fail(String),
    Panic(String),
}

/// Generator whose behavior is fixed up front. `delay: None` never answers.
pub struct ScriptedGenerator {
    script: Script,
    delay: Option<Duration>,
    init_error: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn with_script(script: Script, delay: Option<Duration>) -> Self {
        Self {
            script,
            delay,
            init_error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(reply: &str, delay: Duration) -> Self {
        Self::with_script(Script::Reply(reply.to_string()), Some(delay))
    }

    /// Answers `re:<prompt>`.
    pub fn echoing(delay: Duration) -> Self {
        Self::with_script(Script::Echo, Some(delay))
    }

    pub fn silent() -> Self {
        Self::with_script(Script::Echo, None)
    }

    pub fn failing(detail: &str) -> Self {
        Self::with_script(Script::Fail(detail.to_string()), Some(Duration::ZERO))
    }

    pub fn panicking(message: &str) -> Self {
        Self::with_script(Script::Panic(message.to_string()), Some(Duration::ZERO))
    }

    pub fn with_init_error(mut self, detail: &str) -> Self {
        self.init_error = Some(detail.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseGenerator for ScriptedGenerator {
    async fn initialize(&self) -> Result<(), GeneratorError> {
        match &self.init_error {
            Some(detail) => Err(GeneratorError::Initialization(detail.clone())),
            None => Ok(()),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }

        match &self.script {
            Script::Reply(reply) => Ok(reply.clone()),
            Script::Echo => Ok(format!("re:{prompt}")),
            Script::Fail(detail) => Err(GeneratorError::Generation(detail.clone())),
            Script::Panic(message) => panic!("{message}"),
        }
    }
}
