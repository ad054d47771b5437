use crate::core::callback::CallbackToken;
use crate::domain::model::{ActionButton, Decision, OutboundMessage, ReviewStage};
use crate::utils::error::Result;

const APPROVE_LABEL: &str = "✅ Approve";
const REJECT_LABEL: &str = "❌ Reject";

/// 舊版 Markdown 的實體字元前加反斜線，讓章節內容原樣顯示
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// 核可 / 退回兩個按鈕
pub fn review_buttons(
    stage: ReviewStage,
    chapter_index: u32,
    document_id: &str,
) -> Result<Vec<ActionButton>> {
    let approve = CallbackToken::new(Decision::Approve, stage, chapter_index, document_id);
    let reject = approve.counterpart();

    Ok(vec![
        ActionButton {
            label: APPROVE_LABEL.to_string(),
            callback_data: approve.encode()?,
        },
        ActionButton {
            label: REJECT_LABEL.to_string(),
            callback_data: reject.encode()?,
        },
    ])
}

pub fn chapter_review_request(
    chat_id: Option<&str>,
    document_id: &str,
    chapter_index: u32,
    source: &str,
) -> Result<OutboundMessage> {
    let text = format!(
        "📝 *Chapter Structure Review* (Chapter {})\n\n*Source Text:*\n{}\n\n_Is this segmentation correct?_",
        chapter_index.saturating_add(1),
        escape_markdown(source)
    );
    let buttons = review_buttons(ReviewStage::Chapter, chapter_index, document_id)?;
    Ok(OutboundMessage::text(chat_id, text).with_buttons(buttons))
}

pub fn translation_review_request(
    chat_id: Option<&str>,
    document_id: &str,
    chapter_index: u32,
    source: &str,
    translation: &str,
) -> Result<OutboundMessage> {
    let text = format!(
        "📝 *Translation Approval* (Chapter {})\n\n*Source:*\n{}\n\n*Translation:*\n{}\n\n_Is this translation accurate?_",
        chapter_index.saturating_add(1),
        escape_markdown(source),
        escape_markdown(translation)
    );
    let buttons = review_buttons(ReviewStage::Translation, chapter_index, document_id)?;
    Ok(OutboundMessage::text(chat_id, text).with_buttons(buttons))
}

pub fn adaptation_review_request(
    chat_id: Option<&str>,
    document_id: &str,
    chapter_index: u32,
    translation: &str,
    adaptation: &str,
) -> Result<OutboundMessage> {
    let text = format!(
        "✨ *Adaptation Approval* (Chapter {})\n\n*Translation:*\n{}\n\n*Adaptation:*\n{}\n\n_Is this adaptation natural?_",
        chapter_index.saturating_add(1),
        escape_markdown(translation),
        escape_markdown(adaptation)
    );
    let buttons = review_buttons(ReviewStage::Adaptation, chapter_index, document_id)?;
    Ok(OutboundMessage::text(chat_id, text).with_buttons(buttons))
}

pub fn progress_message(token: &CallbackToken) -> Option<String> {
    match (token.decision, token.stage) {
        (Decision::Approve, ReviewStage::Chapter) => Some(format!(
            "✅ Chapter {} Approved. Translating... ⏳",
            token.chapter_number()
        )),
        (Decision::Approve, ReviewStage::Translation) => Some(format!(
            "✅ Translation {} Approved. Adapting... ⏳",
            token.chapter_number()
        )),
        _ => None,
    }
}

pub fn completion_message(chapter_number: u32) -> String {
    format!(
        "✅ Adaptation {} Approved. Chapter Completed! 🎉",
        chapter_number
    )
}

pub fn rejection_message(stage: ReviewStage, chapter_number: u32) -> String {
    format!("❌ {} {} Rejected.", stage.label(), chapter_number)
}

pub const ROW_MISSING_MESSAGE: &str = "❌ Error: Could not fetch data from sheet.";
