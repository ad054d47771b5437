// Adapters layer: concrete implementations of the domain ports

pub mod csv_store;
pub mod document;
pub mod memory;
pub mod openai;
pub mod segmenter;
pub mod sheets;
pub mod telegram;

pub use csv_store::CsvStore;
pub use document::DocumentLoader;
pub use memory::MemoryStore;
pub use openai::{EchoTransformer, OpenAiTransformer, PromptSettings};
pub use segmenter::SentenceSegmenter;
pub use sheets::{GoogleAuth, SheetsStore};
pub use telegram::{LogNotifier, TelegramNotifier};
