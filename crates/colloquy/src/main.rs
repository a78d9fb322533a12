use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use colloquy_config::ScriptResolver;
use colloquy_core::{EmailSettings, Session, SessionController, SessionDeps};
use colloquy_logging::{init_tracing, LogFormat, Logger};
use colloquy_notify::{Mailer, Summarizer};
use colloquy_provider::{client_from_env, CompletionClient, ModelParams, ProviderKind};
use colloquy_store::{FileMirror, LocalFiles, RecordMirror, RecordStore, TranscriptStore};

mod chat;
mod config;

use config::AppConfig;

/// Respondent ids with this prefix may repeat completed interviews.
const TEST_ID_PREFIX: &str = "test";

#[derive(Parser, Debug)]
#[command(
    name = "colloquy",
    about = "Scripted LLM interviews at the terminal",
    version,
    author
)]
struct Cli {
    /// Respondent's full name
    #[arg(short, long)]
    name: String,

    /// Respondent's email address (confirmed again before sending)
    #[arg(short, long)]
    email: String,

    /// Respondent identifier, e.g. a student number
    #[arg(short = 's', long)]
    student_number: Option<String>,

    /// Company or organization, used in transcript file names
    #[arg(long)]
    company: Option<String>,

    /// Interview script name (a TOML file in the scripts directory)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory of interview script files
    #[arg(long)]
    scripts_dir: Option<PathBuf>,

    /// Where transcript and timing files are written
    #[arg(short = 'd', long)]
    data_dir: Option<PathBuf>,

    /// Record database location
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Provider family override ("openai" / "anthropic")
    #[arg(short, long)]
    provider: Option<String>,

    /// Model override (takes precedence over the script)
    #[arg(short, long)]
    model: Option<String>,

    /// Log output format
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    /// List available interview scripts and exit
    #[arg(long)]
    list_scripts: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("warn", cli.log_format);

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let app_config = AppConfig::load(&working_dir)?.unwrap_or_default();

    let scripts_dir = cli
        .scripts_dir
        .clone()
        .or(app_config.session.scripts_dir.clone())
        .unwrap_or_else(|| working_dir.join("scripts"));
    let resolver = ScriptResolver::new(&scripts_dir);

    if cli.list_scripts {
        for name in resolver.list() {
            println!("{}", name);
        }
        return Ok(());
    }

    let script_name = cli
        .config
        .clone()
        .or(app_config.session.default_script.clone())
        .unwrap_or_else(|| "default".to_string());
    let mut script = resolver.resolve(&script_name)?;
    if let Some(model) = cli.model.clone().or(app_config.model.clone()) {
        script.model = model;
    }

    // Provider precedence: command line, then script, then app config.
    let provider: ProviderKind = cli
        .provider
        .as_deref()
        .or(script.provider.as_deref())
        .or(app_config.provider.as_deref())
        .unwrap_or("openai")
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let client: Arc<dyn CompletionClient> = Arc::from(client_from_env(provider)?);

    let logger = match &app_config.session.log_file {
        Some(path) => Logger::with_file(cli.log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(cli.log_format),
    };

    let data_dir = cli
        .data_dir
        .clone()
        .or(app_config.storage.data_dir.clone())
        .unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("colloquy")
        });

    let records = Arc::new(match cli.db_path.as_ref().or(app_config.storage.db_path.as_ref()) {
        Some(path) => RecordStore::open_at(path)?,
        None => RecordStore::open()?,
    });

    // Completed interviews are one-shot, except for test accounts.
    if let Some(id) = &cli.student_number {
        if !id.starts_with(TEST_ID_PREFIX) && records.has_completed(id, &script.name)? {
            println!(
                "You have already completed the '{}' interview. Thank you again for participating!",
                script.name
            );
            return Ok(());
        }
    }

    let mut store = TranscriptStore::new(LocalFiles::new(&data_dir))
        .with_mirror(Box::new(RecordMirror::new(records.clone())));
    if let Some(path) = &app_config.storage.mirror_file {
        store = store.with_mirror(Box::new(FileMirror::new(path)));
    }

    let summarizer = Summarizer::new(
        client.clone(),
        ModelParams::new(script.model.clone(), 512),
    );

    let mut email_settings = EmailSettings::new(cli.email.clone());
    let mut mailer = None;
    if let Some(email_config) = app_config.email {
        if let Some(domain) = email_config.student_domain {
            email_settings = email_settings.with_student_domain(domain);
        }
        if let Some(subject) = email_config.subject {
            email_settings.subject = subject;
        }
        let mut smtp = email_config.smtp;
        if smtp.password.is_empty() {
            smtp.password = std::env::var("COLLOQUY_SMTP_PASSWORD").unwrap_or_default();
        }
        mailer = Some(Mailer::new(smtp));
    }

    let session = Session::new(
        script.name.clone(),
        cli.name.clone(),
        cli.student_number.clone(),
        cli.company.clone(),
    );

    println!();
    println!(
        "{} {}",
        "Welcome to your interview,".bold(),
        cli.name.bold()
    );
    println!(
        "{}",
        "Type your answers and press Enter. Send /quit to stop early.".dimmed()
    );
    println!();

    let controller = SessionController::new(
        session,
        script,
        SessionDeps {
            client,
            store,
            records,
            summarizer,
            mailer,
            email: email_settings,
            logger: Arc::new(logger),
        },
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received. Wrapping up the interview...");
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    chat::run_session(controller, interrupted, &cli.email).await
}
