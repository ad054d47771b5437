use crate::domain::model::{Decision, ReviewStage};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "transauto")]
#[command(about = "Human-in-the-loop translation workflow driven by chat approvals")]
#[command(version)]
pub struct Cli {
    /// TOML 配置檔；未指定時從環境變數 (.env) 讀取
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the webhook server
    Serve {
        /// Override the bind address (e.g. 0.0.0.0:3000)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Segment a source document into chapters and request reviews
    Ingest(IngestArgs),
    /// Create a new project document (<name>_Trans)
    NewProject { name: String },
    /// List the project documents known to the configured store
    Projects,
    /// Show the chapter list of a document
    Status {
        #[arg(long)]
        document: Option<String>,
    },
    /// Approve or reject a stage without going through chat
    Decide {
        /// Zero-based chapter index
        chapter_index: u32,
        /// chapter | translation | adaptation
        stage: ReviewStage,
        /// approve | reject
        decision: Decision,
        #[arg(long)]
        document: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Local .txt, .docx or .pdf file
    #[arg(long, required_unless_present = "url", conflicts_with = "url")]
    pub file: Option<PathBuf>,

    /// Public Google Docs URL
    #[arg(long)]
    pub url: Option<String>,

    /// Target document; defaults to the configured document
    #[arg(long)]
    pub document: Option<String>,
}
