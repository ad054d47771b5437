use clap::Parser;
use transauto::config::cli::{Cli, Command, IngestArgs};
use transauto::config::{AppConfig, LogFormat};
use transauto::server::{self, AppState};
use transauto::utils::error::{ErrorSeverity, FlowError, Result};
use transauto::utils::validation::{validate_socket_addr, Validate};
use transauto::utils::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(exit_code(&e).max(1));
        }
    };

    // 初始化日誌
    let is_server = matches!(cli.command, Command::Serve { .. });
    let format = config.logging.format.unwrap_or(if is_server {
        LogFormat::Json
    } else {
        LogFormat::Compact
    });
    let level = config.logging.level.as_deref();
    match format {
        LogFormat::Json => logger::init_server_logger(cli.verbose, level),
        LogFormat::Compact => logger::init_cli_logger(cli.verbose, level),
    }

    if let Ok(path) = &dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }
    if cli.verbose {
        tracing::debug!(
            store = %config.store.backend,
            review_policy = %config.intake.review_policy,
            "Configuration loaded"
        );
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(exit_code(&e).max(1));
    }

    if let Err(e) = run(cli.command, &config).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        let code = exit_code(&e);
        if code > 0 {
            std::process::exit(code);
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::from_env(),
    }
}

/// 根據錯誤嚴重程度決定退出碼
fn exit_code(error: &FlowError) -> i32 {
    match error.severity() {
        ErrorSeverity::Low => 0,      // 警告，但成功
        ErrorSeverity::Medium => 2,   // 可重試
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 設定 / 系統錯誤
    }
}

async fn run(command: Command, config: &AppConfig) -> Result<()> {
    let (engine, intake) = config.build_services()?;

    match command {
        Command::Serve { bind } => {
            let addr = match bind {
                Some(bind) => validate_socket_addr("--bind", &bind)?,
                None => config.bind_addr()?,
            };
            let state = AppState::new(engine, intake, config.store.document_id.clone());
            server::serve(addr, state).await
        }
        Command::Ingest(args) => {
            let document_id = config.resolve_document(args.document.as_deref())?;
            let text = read_source(config, &args).await?;
            let report = intake.ingest(&document_id, &text).await?;

            println!("✅ Ingested {} chapters into {}", report.chapter_count, report.document_id);
            println!("📨 Review requests sent: {}", report.requests_sent);
            Ok(())
        }
        Command::NewProject { name } => {
            let document_id = intake.create_project(&name).await?;
            println!("📁 Created project document: {}", document_id);
            Ok(())
        }
        Command::Projects => {
            let projects = intake.list_projects().await?;
            println!("📚 {} project(s)", projects.len());
            for project in &projects {
                match &project.link {
                    Some(link) => println!("  {:<30} {} ({})", project.name, project.id, link),
                    None => println!("  {:<30} {}", project.name, project.id),
                }
            }
            Ok(())
        }
        Command::Status { document } => {
            let document_id = config.resolve_document(document.as_deref())?;
            let chapters = intake.list_chapters(&document_id).await?;

            println!("📄 {} ({} chapters)", document_id, chapters.len());
            for chapter in &chapters {
                let status = chapter.status.map(|s| s.as_str()).unwrap_or("-");
                let preview: String = chapter.source_text.chars().take(60).collect();
                println!(
                    "  #{:<3} row {:<4} {:<15} {}",
                    chapter.chapter_number, chapter.row_number, status, preview
                );
            }
            Ok(())
        }
        Command::Decide {
            chapter_index,
            stage,
            decision,
            document,
        } => {
            let document_id = config.resolve_document(document.as_deref())?;
            let outcome = engine
                .decide(&document_id, chapter_index, stage, decision)
                .await?;

            println!("{}", outcome.acknowledgement());
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
    }
}

async fn read_source(config: &AppConfig, args: &IngestArgs) -> Result<String> {
    let loader = config.document_loader();
    match (&args.file, &args.url) {
        (Some(path), _) => loader.load_file(path).await,
        (None, Some(url)) => loader.fetch_url(url).await,
        (None, None) => Err(FlowError::MissingConfigError {
            field: "--file or --url".to_string(),
        }),
    }
}
