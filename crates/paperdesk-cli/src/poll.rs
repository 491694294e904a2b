//! `--wait` support: poll a background task until it settles.

use std::future::Future;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use paperdesk_core::ApiError;
use paperdesk_core::models::{ParseStatus, TaskProgress, TaskStatus, TaskTicket};

/// One observation of a background task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskCheck<T> {
    Running { progress: Option<u8> },
    Done(T),
    Failed(String),
}

impl TaskCheck<String> {
    /// Parse task: done once the backend reports the resulting paper id.
    pub fn from_parse(status: ParseStatus) -> Self {
        match status.status {
            TaskStatus::Completed => match status.paper_id {
                Some(paper_id) => TaskCheck::Done(paper_id),
                None => TaskCheck::Failed("parse completed without a paper id".to_string()),
            },
            TaskStatus::Failed => TaskCheck::Failed(
                status
                    .error
                    .unwrap_or_else(|| "parse task failed".to_string()),
            ),
            TaskStatus::Pending | TaskStatus::Processing => TaskCheck::Running {
                progress: status.progress,
            },
        }
    }
}

impl TaskCheck<()> {
    pub fn from_progress(task: TaskProgress) -> Self {
        match task.status {
            TaskStatus::Completed => TaskCheck::Done(()),
            TaskStatus::Failed => {
                TaskCheck::Failed(task.error.unwrap_or_else(|| "task failed".to_string()))
            }
            TaskStatus::Pending | TaskStatus::Processing => TaskCheck::Running {
                progress: task.progress,
            },
        }
    }
}

/// A request ticket that has already settled needs no polling. The backend
/// answers `completed` straight away when the artifact exists, and the
/// ticket's task id is then not a pollable task.
pub fn settled_ticket(ticket: &TaskTicket) -> Option<TaskCheck<()>> {
    if !ticket.status.is_terminal() {
        return None;
    }
    match ticket.status {
        TaskStatus::Failed if ticket.message.is_empty() => {
            Some(TaskCheck::Failed("task failed".to_string()))
        }
        TaskStatus::Failed => Some(TaskCheck::Failed(ticket.message.clone())),
        _ => Some(TaskCheck::Done(())),
    }
}

/// Summaries have no status endpoint: a 404 means it is not written yet.
pub fn summary_check<T>(result: Result<T, ApiError>) -> Result<TaskCheck<T>, ApiError> {
    match result {
        Ok(summary) => Ok(TaskCheck::Done(summary)),
        Err(e) if e.is_not_found() => Ok(TaskCheck::Running { progress: None }),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_wait: Duration,
}

/// Call `check` every `interval` until it reports done or failed, or until
/// `max_wait` has elapsed. Transport and backend errors abort the wait.
pub async fn wait_for<T, F, Fut>(
    label: &str,
    settings: PollSettings,
    show_spinner: bool,
    mut check: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TaskCheck<T>, ApiError>>,
{
    let spinner = if show_spinner {
        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]").unwrap());
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    } else {
        ProgressBar::hidden()
    };

    let started = tokio::time::Instant::now();
    loop {
        match check().await {
            Ok(TaskCheck::Done(value)) => {
                spinner.finish_with_message(format!("{} done", label));
                return Ok(value);
            }
            Ok(TaskCheck::Failed(reason)) => {
                spinner.abandon_with_message(format!("{} failed", label));
                anyhow::bail!("{}", reason);
            }
            Ok(TaskCheck::Running { progress }) => {
                match progress {
                    Some(pct) => spinner.set_message(format!("{} ({}%)", label, pct)),
                    None => spinner.set_message(label.to_string()),
                }
                tracing::debug!(task = label, ?progress, "still running");
            }
            Err(e) => {
                spinner.abandon();
                return Err(e.into());
            }
        }

        if started.elapsed() + settings.interval > settings.max_wait {
            spinner.abandon_with_message(format!("{} still running", label));
            anyhow::bail!(
                "gave up waiting for {} after {:.0?}; the task may still finish in the background",
                label,
                started.elapsed()
            );
        }
        tokio::time::sleep(settings.interval).await;
    }
}
