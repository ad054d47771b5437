use crate::domain::model::OutboundMessage;
use crate::domain::ports::Notifier;
use crate::utils::error::{FlowError, Result};
use async_trait::async_trait;
use teloxide::payloads::{AnswerCallbackQuerySetters, SendMessageSetters};
use teloxide::requests::Requester;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, Recipient};
use teloxide::{Bot, RequestError};
use url::Url;

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram Bot API (sendMessage / answerCallbackQuery)
pub struct TelegramNotifier {
    bot: Bot,
    default_chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, default_chat_id: impl Into<String>) -> Self {
        Self {
            bot: Bot::new(bot_token),
            default_chat_id: default_chat_id.into(),
        }
    }

    pub fn with_api_base(
        bot_token: impl Into<String>,
        default_chat_id: impl Into<String>,
        api_base: &str,
    ) -> Result<Self> {
        // 方法路徑以 join 接在 base 後面，需要結尾的 '/'
        let base = if api_base.ends_with('/') {
            api_base.to_string()
        } else {
            format!("{}/", api_base)
        };
        let api_url = Url::parse(&base).map_err(|e| FlowError::InvalidConfigValueError {
            field: "telegram.api_base".to_string(),
            value: api_base.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            bot: Bot::new(bot_token).set_api_url(api_url),
            default_chat_id: default_chat_id.into(),
        })
    }

    fn recipient(&self, message: &OutboundMessage) -> Recipient {
        let chat = message.chat_id.as_deref().unwrap_or(&self.default_chat_id);
        match chat.parse::<i64>() {
            Ok(id) => Recipient::Id(ChatId(id)),
            Err(_) => Recipient::ChannelUsername(chat.to_string()),
        }
    }

    fn keyboard(message: &OutboundMessage) -> Option<InlineKeyboardMarkup> {
        if message.buttons.is_empty() {
            return None;
        }
        let row: Vec<InlineKeyboardButton> = message
            .buttons
            .iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.callback_data.clone()))
            .collect();
        Some(InlineKeyboardMarkup::new(vec![row]))
    }

    async fn send_message(&self, message: &OutboundMessage, markdown: bool) -> std::result::Result<(), RequestError> {
        let mut request = self.bot.send_message(self.recipient(message), message.text.clone());
        if markdown {
            request = request.parse_mode(ParseMode::Markdown);
        }
        if let Some(keyboard) = Self::keyboard(message) {
            request = request.reply_markup(keyboard);
        }
        request.await.map(|_| ())
    }
}

fn notify_error(method: &str, error: RequestError) -> FlowError {
    FlowError::NotifyError {
        message: format!("{} failed: {}", method, error),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        match self.send_message(message, true).await {
            Ok(()) => {}
            // 格式解析失敗時改送純文字，按鈕保留
            Err(RequestError::Api(api_error)) => {
                tracing::warn!(
                    error = %api_error,
                    "⚠️ Telegram rejected Markdown message, retrying as plain text"
                );
                self.send_message(message, false)
                    .await
                    .map_err(|e| notify_error("sendMessage", e))?;
            }
            Err(e) => return Err(notify_error("sendMessage", e)),
        }
        tracing::debug!("📨 Telegram message sent");
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()> {
        self.bot
            .answer_callback_query(callback_id)
            .text(text)
            .await
            .map_err(|e| notify_error("answerCallbackQuery", e))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

/// 未設定聊天憑證時使用：只寫 log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        tracing::warn!(
            buttons = message.buttons.len(),
            "⚠️ Telegram credentials not set. Skipping notification: {}",
            message.text.lines().find(|l| !l.trim().is_empty()).unwrap_or("")
        );
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()> {
        tracing::debug!(callback_id, "Callback answer skipped: {}", text);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ActionButton;
    use httpmock::prelude::*;
    use serde_json::json;

    fn sent_message() -> serde_json::Value {
        json!({
            "ok": true,
            "result": {
                "message_id": 1,
                "date": 0,
                "chat": { "id": 1001, "type": "private" },
                "text": "ok"
            }
        })
    }

    fn notifier(server: &MockServer) -> TelegramNotifier {
        TelegramNotifier::with_api_base("TOKEN", "1001", &server.base_url()).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_with_inline_keyboard() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botTOKEN/SendMessage")
                .json_body_partial(
                    json!({
                        "chat_id": 1001,
                        "text": "Review?",
                        "parse_mode": "Markdown",
                        "reply_markup": {
                            "inline_keyboard": [[
                                { "text": "✅ Approve", "callback_data": "ap_ch:0:doc" },
                                { "text": "❌ Reject", "callback_data": "re_ch:0:doc" }
                            ]]
                        }
                    })
                    .to_string(),
                );
            then.status(200).json_body(sent_message());
        });

        let message = OutboundMessage::text(None, "Review?").with_buttons(vec![
            ActionButton {
                label: "✅ Approve".to_string(),
                callback_data: "ap_ch:0:doc".to_string(),
            },
            ActionButton {
                label: "❌ Reject".to_string(),
                callback_data: "re_ch:0:doc".to_string(),
            },
        ]);

        notifier(&server).send(&message).await.unwrap();
        api_mock.assert();
    }

    #[tokio::test]
    async fn test_reply_chat_overrides_default() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botTOKEN/SendMessage")
                .body_contains("\"chat_id\":777");
            then.status(200).json_body(sent_message());
        });

        notifier(&server)
            .send(&OutboundMessage::text(Some("777"), "hi"))
            .await
            .unwrap();
        api_mock.assert();
    }

    #[tokio::test]
    async fn test_unparseable_markdown_falls_back_to_plain_text() {
        let server = MockServer::start();
        let markdown_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botTOKEN/SendMessage")
                .body_contains("\"parse_mode\"");
            then.status(400).json_body(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities: Can't find end of the entity starting at byte offset 5"
            }));
        });
        let plain_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botTOKEN/SendMessage")
                .body_contains("snake_case")
                .matches(|req| {
                    let body = String::from_utf8_lossy(req.body.as_deref().unwrap_or_default());
                    !body.contains("parse_mode")
                });
            then.status(200).json_body(sent_message());
        });

        notifier(&server)
            .send(&OutboundMessage::text(None, "uses snake_case"))
            .await
            .unwrap();
        markdown_mock.assert();
        plain_mock.assert();
    }

    #[tokio::test]
    async fn test_not_ok_response_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/botTOKEN/SendMessage");
            then.status(400).json_body(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            }));
        });

        let err = notifier(&server)
            .send(&OutboundMessage::text(None, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::NotifyError { .. }));
    }

    #[tokio::test]
    async fn test_answer_callback_query() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botTOKEN/AnswerCallbackQuery")
                .json_body_partial(json!({ "callback_query_id": "cb-1", "text": "Processed" }).to_string());
            then.status(200).json_body(json!({ "ok": true, "result": true }));
        });

        notifier(&server).answer_callback("cb-1", "Processed").await.unwrap();
        api_mock.assert();
    }

    #[test]
    fn test_invalid_api_base_is_config_error() {
        let err = TelegramNotifier::with_api_base("TOKEN", "1001", "not a url").err().unwrap();
        assert!(matches!(err, FlowError::InvalidConfigValueError { .. }));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notifier = LogNotifier;
        assert!(notifier
            .send(&OutboundMessage::text(None, "\n📝 *Chapter*"))
            .await
            .is_ok());
        assert!(notifier.answer_callback("x", "Processed").await.is_ok());
    }
}
