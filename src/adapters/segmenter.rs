use crate::domain::ports::Segmenter;

const TERMINALS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// 以句子為單位分章：每章 2~3 句
///
/// 段落以空白行分隔。段落結束時若已累積 2 句以上就成章，不足 2 句則併入下一段。
/// 最後殘留的文字 (包含沒有句點結尾的句子) 也會成為一章。
#[derive(Debug, Clone)]
pub struct SentenceSegmenter {
    min_sentences: usize,
    max_sentences: usize,
}

impl Default for SentenceSegmenter {
    fn default() -> Self {
        Self {
            min_sentences: 2,
            max_sentences: 3,
        }
    }
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn paragraphs(text: &str) -> Vec<String> {
        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    paragraphs.push(current.join("\n"));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            paragraphs.push(current.join("\n"));
        }

        paragraphs
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    fn sentences(paragraph: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut buffer = String::new();
        let mut chars = paragraph.chars().peekable();

        while let Some(c) = chars.next() {
            buffer.push(c);
            if TERMINALS.contains(&c) {
                // 連續的標點 ("?!"、"...") 屬於同一句
                while let Some(&next) = chars.peek() {
                    if !TERMINALS.contains(&next) {
                        break;
                    }
                    buffer.push(next);
                    chars.next();
                }
                let sentence = buffer.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                buffer.clear();
            }
        }

        let rest = buffer.trim();
        if !rest.is_empty() {
            sentences.push(rest.to_string());
        }
        sentences
    }
}

impl Segmenter for SentenceSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let mut chapters = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for paragraph in Self::paragraphs(text) {
            let sentences = Self::sentences(&paragraph);
            let last = sentences.len().saturating_sub(1);

            for (i, sentence) in sentences.into_iter().enumerate() {
                current.push(sentence);
                let held = current.len();
                if held >= self.min_sentences && (i == last || held >= self.max_sentences) {
                    chapters.push(current.join(" "));
                    current.clear();
                }
            }
        }

        if !current.is_empty() {
            chapters.push(current.join(" "));
        }

        tracing::debug!("✂️ Segmented text into {} chapters", chapters.len());
        chapters
    }
}
