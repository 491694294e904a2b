use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use paperdesk_core::config_file::{
    self, ApiConfig, ConfigFile, PollingConfig, SummaryConfig, TranslationConfig, merge,
};
use paperdesk_core::{AppState, Role, Route};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

mod output;
mod poll;

use output::ColorMode;
use poll::{PollSettings, TaskCheck};

/// Research paper assistant - upload, translate, summarize and chat with papers
#[derive(Parser, Debug)]
#[command(name = "paperdesk", version, about, long_about = None)]
struct Cli {
    /// Backend base URL (default: http://localhost:8000/api)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF for parsing
    Upload {
        file_path: PathBuf,

        /// Wait for parsing to finish
        #[arg(long)]
        wait: bool,
    },

    /// Parse a paper from a URL
    ParseUrl {
        url: String,

        /// Wait for parsing to finish
        #[arg(long)]
        wait: bool,
    },

    /// Show the status of a parse task
    Status { task_id: String },

    /// History view: every parsed paper, most recently modified first
    List,

    /// Show a paper with its translation and summary status
    Show {
        paper_id: String,

        /// Print the translated (or original) full text too
        #[arg(long)]
        full: bool,
    },

    /// Delete a paper from the backend
    Delete { paper_id: String },

    /// Request a translation of a paper
    Translate {
        paper_id: String,

        /// Source language (overrides config)
        #[arg(long)]
        source_lang: Option<String>,

        /// Target language (overrides config)
        #[arg(long)]
        target_lang: Option<String>,

        /// Wait for the translation and print it
        #[arg(long)]
        wait: bool,
    },

    /// Request a summary of a paper
    Summarize {
        paper_id: String,

        /// Summary type (overrides config)
        #[arg(long)]
        summary_type: Option<String>,

        /// Wait for the summary and print it
        #[arg(long)]
        wait: bool,
    },

    /// Ask a question about a paper. Without a message, starts an interactive session.
    Chat {
        paper_id: String,

        message: Option<String>,

        /// Continue an existing chat session
        #[arg(long)]
        session: Option<String>,
    },

    /// Print the server-side history of a chat session
    History { session_id: String },

    /// Delete a chat session
    EndSession { session_id: String },

    /// Open a view by route path (e.g. /, /history, /paper/<id>)
    Open { path: String },

    /// Save defaults to the user config file, or print the effective config
    /// when no option is given. Honors the global --api-base and --timeout.
    Config {
        /// Default translation source language
        #[arg(long)]
        source_lang: Option<String>,

        /// Default translation target language
        #[arg(long)]
        target_lang: Option<String>,

        /// Default summary type
        #[arg(long)]
        summary_type: Option<String>,

        /// Seconds between --wait polls
        #[arg(long)]
        poll_interval: Option<u64>,

        /// Seconds before --wait gives up
        #[arg(long)]
        max_wait: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let color = ColorMode(!cli.no_color);
    let mut out = std::io::stdout();

    if let Command::Config {
        source_lang,
        target_lang,
        summary_type,
        poll_interval,
        max_wait,
    } = cli.command
    {
        let settings = ConfigFile {
            api: Some(ApiConfig {
                base_url: cli.api_base,
                timeout_secs: cli.timeout,
            }),
            translation: Some(TranslationConfig {
                source_lang,
                target_lang,
            }),
            summary: Some(SummaryConfig { summary_type }),
            polling: Some(PollingConfig {
                interval_secs: poll_interval,
                max_wait_secs: max_wait,
            }),
        };
        return configure(settings, &mut out);
    }

    let mut config = resolve_config(config_file::load_config(), cli.api_base, cli.timeout);

    // Per-command overrides for artifact parameters.
    match &cli.command {
        Command::Translate {
            source_lang,
            target_lang,
            ..
        } => {
            let translation = config.translation.get_or_insert_with(Default::default);
            if let Some(lang) = source_lang {
                translation.source_lang = Some(lang.clone());
            }
            if let Some(lang) = target_lang {
                translation.target_lang = Some(lang.clone());
            }
        }
        Command::Summarize {
            summary_type: Some(kind),
            ..
        } => {
            config
                .summary
                .get_or_insert_with(Default::default)
                .summary_type = Some(kind.clone());
        }
        _ => {}
    }

    let (interval, max_wait) = config.polling();
    let polling = PollSettings { interval, max_wait };
    let app = AppState::new(&config)?;
    tracing::debug!(?app, "client ready");

    run(cli.command, &app, polling, &mut out, color).await
}

async fn run(
    command: Command,
    app: &AppState,
    polling: PollSettings,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    match command {
        Command::Upload { file_path, wait } => {
            upload(app, &file_path, wait, polling, out, color).await
        }
        Command::ParseUrl { url, wait } => {
            let resp = app.client.parse_url(&url).await?;
            output::print_task_created(out, &resp, color)?;
            if wait {
                wait_for_parse(app, &resp.task_id, polling, out, color).await?;
            }
            Ok(())
        }
        Command::Status { task_id } => {
            let status = app.client.parse_status(&task_id).await?;
            output::print_parse_status(out, &status, color)?;
            Ok(())
        }
        Command::List => open_view(app, Route::History, out, color).await,
        Command::Show { paper_id, full } => show(app, &paper_id, full, out, color).await,
        Command::Delete { paper_id } => {
            let ack = app.client.delete_paper(&paper_id).await?;
            let message = ack
                .message
                .unwrap_or_else(|| format!("Deleted paper {}", paper_id));
            writeln!(out, "{}", message)?;
            Ok(())
        }
        Command::Translate { paper_id, wait, .. } => {
            translate(app, &paper_id, wait, polling, out, color).await
        }
        Command::Summarize { paper_id, wait, .. } => {
            summarize(app, &paper_id, wait, polling, out, color).await
        }
        Command::Chat {
            paper_id,
            message,
            session,
        } => match message {
            Some(message) => {
                chat_once(app, &paper_id, &message, session.as_deref(), out, color).await
            }
            None => chat_loop(app, &paper_id, session, out, color).await,
        },
        Command::History { session_id } => {
            let history = app.client.chat_history(&session_id).await?;
            output::print_history(out, &history, color)?;
            Ok(())
        }
        Command::EndSession { session_id } => {
            app.chat.delete_session(&session_id).await?;
            writeln!(out, "Ended session {}", session_id)?;
            Ok(())
        }
        Command::Open { path } => {
            let route = paperdesk_core::resolve(&path)
                .ok_or_else(|| anyhow::anyhow!("No view for path: {}", path))?;
            open_view(app, route, out, color).await
        }
        Command::Config { .. } => {
            anyhow::bail!("config is handled before the client is built")
        }
    }
}

/// Persist the given settings over the platform config file. With nothing to
/// set, print the effective configuration instead.
fn configure(settings: ConfigFile, out: &mut dyn Write) -> anyhow::Result<()> {
    // `merge` fills every section, so compare against a merged empty config.
    if settings == merge(ConfigFile::default(), ConfigFile::default()) {
        let effective = config_file::to_toml(&config_file::load_config()).map_err(anyhow::Error::msg)?;
        match config_file::config_path() {
            Some(path) => writeln!(out, "# {}", path.display())?,
            None => writeln!(out, "# no platform config directory")?,
        }
        write!(out, "{}", effective)?;
        return Ok(());
    }

    let path = config_file::config_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    let updated = update_config_at(&path, settings)?;
    tracing::debug!(path = %path.display(), ?updated, "config saved");
    writeln!(out, "Saved {}", path.display())?;
    Ok(())
}

/// Overlay `settings` on the file at `path` (missing file = empty) and write
/// the result back.
fn update_config_at(path: &Path, settings: ConfigFile) -> anyhow::Result<ConfigFile> {
    let current = config_file::load_from_path(path).unwrap_or_default();
    let updated = merge(current, settings);
    config_file::save_to_path(&updated, path).map_err(anyhow::Error::msg)?;
    Ok(updated)
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Apply connection overrides: CLI flags > env vars > config file > defaults.
fn resolve_config(mut config: ConfigFile, api_base: Option<String>, timeout: Option<u64>) -> ConfigFile {
    let env_base = std::env::var("PAPERDESK_API_BASE").ok();
    let env_timeout = std::env::var("PAPERDESK_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok());
    apply_overrides(
        &mut config,
        api_base.or(env_base),
        timeout.or(env_timeout),
    );
    config
}

fn apply_overrides(config: &mut ConfigFile, base_url: Option<String>, timeout_secs: Option<u64>) {
    let api = config.api.get_or_insert_with(ApiConfig::default);
    if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
        api.base_url = Some(url);
    }
    if let Some(secs) = timeout_secs {
        api.timeout_secs = Some(secs);
    }
}

async fn upload(
    app: &AppState,
    file_path: &Path,
    wait: bool,
    polling: PollSettings,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    if !file_path.exists() {
        anyhow::bail!("File not found: {}", file_path.display());
    }
    let bytes = std::fs::read(file_path)?;
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "paper.pdf".to_string());

    let resp = app.client.upload_paper(&file_name, bytes).await?;
    output::print_task_created(out, &resp, color)?;
    if wait {
        wait_for_parse(app, &resp.task_id, polling, out, color).await?;
    }
    Ok(())
}

async fn wait_for_parse(
    app: &AppState,
    task_id: &str,
    polling: PollSettings,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    let client = app.client.clone();
    let paper_id = poll::wait_for("parsing", polling, color.enabled(), || {
        let client = client.clone();
        let task_id = task_id.to_string();
        async move { client.parse_status(&task_id).await.map(TaskCheck::from_parse) }
    })
    .await?;
    writeln!(out)?;
    show(app, &paper_id, false, out, color).await
}

async fn show(
    app: &AppState,
    paper_id: &str,
    full: bool,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    let loaded = app.papers.load_paper(paper_id).await;
    tokio::join!(
        app.papers.load_translation(paper_id),
        app.papers.load_summary(paper_id)
    );
    output::print_paper_view(out, &app.papers, full, color)?;
    loaded?;
    Ok(())
}

async fn translate(
    app: &AppState,
    paper_id: &str,
    wait: bool,
    polling: PollSettings,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    let options = app.papers.options();
    writeln!(
        out,
        "Translating {} ({} -> {})",
        paper_id, options.source_lang, options.target_lang
    )?;
    let ticket = app.papers.request_translation(paper_id).await?;
    writeln!(out, "Task {} [{}]", ticket.task_id, ticket.status)?;
    if !wait {
        return Ok(());
    }

    match poll::settled_ticket(&ticket) {
        Some(TaskCheck::Failed(reason)) => anyhow::bail!("{}", reason),
        Some(_) => tracing::debug!(paper_id, "translation already available"),
        None => {
            let client = app.client.clone();
            poll::wait_for("translating", polling, color.enabled(), || {
                let client = client.clone();
                let task_id = ticket.task_id.clone();
                async move {
                    client
                        .translation_status(&task_id)
                        .await
                        .map(TaskCheck::from_progress)
                }
            })
            .await?;
        }
    }

    if !app.papers.load_translation(paper_id).await {
        anyhow::bail!("Translation finished but could not be fetched");
    }
    if let Some(translation) = app.papers.translation() {
        output::print_translation(out, &translation, color)?;
    }
    Ok(())
}

async fn summarize(
    app: &AppState,
    paper_id: &str,
    wait: bool,
    polling: PollSettings,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    let ticket = app.papers.request_summary(paper_id).await?;
    writeln!(
        out,
        "Summary ({}) task {} [{}]",
        app.papers.options().summary_type,
        ticket.task_id,
        ticket.status
    )?;
    if !wait {
        return Ok(());
    }
    if let Some(TaskCheck::Failed(reason)) = poll::settled_ticket(&ticket) {
        anyhow::bail!("{}", reason);
    }

    let client = app.client.clone();
    let summary = poll::wait_for("summarizing", polling, color.enabled(), || {
        let client = client.clone();
        let paper_id = paper_id.to_string();
        async move { poll::summary_check(client.get_summary(&paper_id).await) }
    })
    .await?;
    output::print_summary(out, &summary, color)?;
    Ok(())
}

/// Print whatever the store holds after the last user message of a session.
fn print_reply(
    app: &AppState,
    session_id: &str,
    out: &mut dyn Write,
    color: ColorMode,
) -> std::io::Result<()> {
    let messages = app.chat.get_session_messages(session_id);
    if let Some(reply) = messages.last().filter(|m| m.role == Role::Assistant) {
        output::print_message(out, reply, color)?;
    }
    Ok(())
}

async fn chat_once(
    app: &AppState,
    paper_id: &str,
    message: &str,
    session: Option<&str>,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    app.chat.send_message(paper_id, message, session).await?;
    if let Some(session_id) = app.chat.current_session_id() {
        print_reply(app, &session_id, out, color)?;
        eprintln!("session: {}", session_id);
    }
    Ok(())
}

/// Make `session_id` current and replay whatever history the backend kept.
async fn resume_session(
    app: &AppState,
    paper_id: &str,
    session_id: &str,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    app.chat.ensure_session(paper_id, Some(session_id)).await?;
    app.chat.set_current(session_id);
    match app.chat.load_history(paper_id, session_id).await {
        Ok(count) => {
            for message in app.chat.get_session_messages(session_id) {
                output::print_message(out, &message, color)?;
            }
            tracing::debug!(session = %session_id, count, "resumed session");
        }
        Err(e) => output::print_error(out, e.message(), color)?,
    }
    Ok(())
}

async fn chat_loop(
    app: &AppState,
    paper_id: &str,
    session: Option<String>,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    if let Some(ref session_id) = session {
        resume_session(app, paper_id, session_id, out, color).await?;
    }

    writeln!(out, "Chatting about {}. Empty line or /quit to leave.", paper_id)?;
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|n| (n, line))
        })
        .await??;
        let (read, line) = line;
        let message = line.trim();
        if read == 0 || message.is_empty() || message == "/quit" {
            break;
        }

        match app.chat.send_message(paper_id, message, None).await {
            Ok(_) => {
                if let Some(session_id) = app.chat.current_session_id() {
                    print_reply(app, &session_id, out, color)?;
                }
            }
            Err(e) => output::print_error(out, e.message(), color)?,
        }
    }

    if let Some(session_id) = app.chat.current_session_id() {
        writeln!(out, "Session {} kept. Resume with --session {}", session_id, session_id)?;
    }
    Ok(())
}

/// Render one of the routed views.
async fn open_view(
    app: &AppState,
    route: Route,
    out: &mut dyn Write,
    color: ColorMode,
) -> anyhow::Result<()> {
    tracing::debug!(view = route.name(), path = %route.path(), "opening view");
    match route {
        Route::Home => {
            let list = app.client.list_papers().await?;
            writeln!(out, "paperdesk @ {}", app.client.base_url())?;
            writeln!(out)?;
            let mut recent = list.clone();
            recent.papers.sort_by(|a, b| {
                b.modified_at
                    .unwrap_or(0.0)
                    .total_cmp(&a.modified_at.unwrap_or(0.0))
            });
            recent.papers.truncate(5);
            output::print_paper_list(out, &recent, color)?;
            if list.papers.len() > recent.papers.len() {
                writeln!(out)?;
                writeln!(out, "See all with: paperdesk open /history")?;
            }
            Ok(())
        }
        Route::History => {
            let list = app.client.list_papers().await?;
            output::print_paper_list(out, &list, color)?;
            Ok(())
        }
        Route::Paper { paper_id } => show(app, &paper_id, false, out, color).await,
    }
}
