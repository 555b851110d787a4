use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("{0}")]
    Initialization(String),
    #[error("{0}")]
    Generation(String),
}

/// Produces replies to user prompts. Implementations may be slow or fail;
/// the request pipeline enforces deadlines around them.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn initialize(&self) -> Result<(), GeneratorError>;

    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

const DEFAULT_INIT_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_secs(1);

const KEYWORD_REPLIES: &[(&[&str], &str)] = &[
    (
        &["こんにちは", "挨拶"],
        "こんにちは！お手伝いできることはありますか？",
    ),
    (
        &["名前"],
        "私はマスコットAIアシスタントです。よろしくお願いします！",
    ),
    (&["天気"], "窓の外を見てください。私からは見えないんです..."),
    (
        &["機能", "できること"],
        "現在はシンプルな会話ができます。将来的にはもっと多くの機能が追加される予定です！",
    ),
];

const FALLBACK_REPLIES: &[&str] = &[
    "なるほど、興味深いですね。",
    "もう少し詳しく教えていただけますか？",
    "その質問にはまだ回答できません。別の質問はありますか？",
    "了解しました！何か他にお手伝いできることはありますか？",
    "それについては十分な情報を持っていません。別の話題はどうですか？",
];

/// Built-in generator that answers from a fixed phrase book after a short
/// simulated delay.
#[derive(Debug)]
pub struct CannedGenerator {
    init_delay: Duration,
    response_delay: Duration,
    fallback_cursor: AtomicUsize,
}

impl CannedGenerator {
    pub fn new() -> Self {
        Self::with_delays(DEFAULT_INIT_DELAY, DEFAULT_RESPONSE_DELAY)
    }

    pub fn with_delays(init_delay: Duration, response_delay: Duration) -> Self {
        Self {
            init_delay,
            response_delay,
            fallback_cursor: AtomicUsize::new(0),
        }
    }

    fn reply_for(&self, prompt: &str) -> &'static str {
        for (keywords, reply) in KEYWORD_REPLIES {
            if keywords.iter().any(|keyword| prompt.contains(keyword)) {
                return *reply;
            }
        }

        let index = self.fallback_cursor.fetch_add(1, Ordering::Relaxed);
        FALLBACK_REPLIES[index % FALLBACK_REPLIES.len()]
    }
}

impl Default for CannedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseGenerator for CannedGenerator {
    async fn initialize(&self) -> Result<(), GeneratorError> {
        tokio::time::sleep(self.init_delay).await;
        info!("canned generator ready");
        Ok(())
    }

    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        tokio::time::sleep(self.response_delay).await;
        Ok(self.reply_for(prompt).to_string())
    }
}
