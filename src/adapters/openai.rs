use crate::domain::model::Task;
use crate::domain::ports::TextTransformer;
use crate::utils::error::{FlowError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OPENAI_API: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// 翻譯與潤稿的參數
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSettings {
    pub model: String,
    pub source_language: String,
    pub target_language: String,
    pub context: String,
    pub translate_temperature: f32,
    pub adapt_temperature: f32,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            source_language: "English".to_string(),
            target_language: "Korean".to_string(),
            context: String::new(),
            translate_temperature: 0.3,
            adapt_temperature: 0.4,
        }
    }
}

impl PromptSettings {
    fn system_prompt(&self, task: Task) -> String {
        match task {
            Task::Translate => format!(
                "You are a professional translator for an animation production book.\n\
                 Translate the following {} text to {}.\n\
                 Tone: Professional, industry-standard terms.\n\
                 Context: {}",
                self.source_language, self.target_language, self.context
            ),
            Task::Adapt => format!(
                "You are a professional editor for animation production content.\n\
                 Improve the following {} translation to be more natural, fluent, and suitable for the industry.\n\
                 Maintain the original meaning but enhance readability and flow.",
                self.target_language
            ),
        }
    }

    fn temperature(&self, task: Task) -> f32 {
        match task {
            Task::Translate => self.translate_temperature,
            Task::Adapt => self.adapt_temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    content: Option<String>,
}

pub struct OpenAiTransformer {
    client: Client,
    api_base: String,
    api_key: String,
    settings: PromptSettings,
}

impl OpenAiTransformer {
    pub fn new(api_key: impl Into<String>, settings: PromptSettings) -> Self {
        Self::with_api_base(api_key, settings, DEFAULT_OPENAI_API)
    }

    pub fn with_api_base(
        api_key: impl Into<String>,
        settings: PromptSettings,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            settings,
        }
    }
}

#[async_trait]
impl TextTransformer for OpenAiTransformer {
    async fn transform(&self, task: Task, text: &str) -> Result<String> {
        let system_prompt = self.settings.system_prompt(task);
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.settings.temperature(task),
        };

        tracing::debug!(task = task.as_str(), model = %self.settings.model, "🤖 Requesting completion");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::TransformationError {
                stage: task.as_str().to_string(),
                details: format!("OpenAI returned {}: {}", status, body),
            });
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// 沒有設定 API key 時使用
#[derive(Debug, Default)]
pub struct EchoTransformer;

#[async_trait]
impl TextTransformer for EchoTransformer {
    async fn transform(&self, task: Task, text: &str) -> Result<String> {
        Ok(match task {
            Task::Translate => format!("[Mock Translation] {}", text),
            Task::Adapt => format!("[Mock Adaptation] {}", text),
        })
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}
