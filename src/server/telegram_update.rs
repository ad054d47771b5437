use crate::domain::model::CallbackQuery;
use teloxide::types::{Update, UpdateKind};

impl From<teloxide::types::CallbackQuery> for CallbackQuery {
    fn from(query: teloxide::types::CallbackQuery) -> Self {
        CallbackQuery {
            chat_id: query.message.as_ref().map(|m| m.chat().id.0.to_string()),
            id: query.id,
            data: query.data,
        }
    }
}

/// 只取出按鈕回呼，其他種類的 update 回傳 None
pub fn callback_from_update(update: Update) -> Option<CallbackQuery> {
    match update.kind {
        UpdateKind::CallbackQuery(query) => Some(query.into()),
        _ => None,
    }
}
