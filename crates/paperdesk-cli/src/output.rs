use std::io::Write;

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use paperdesk_core::models::{
    ChatHistory, PaperList, PaperMetadata, ParseStatus, Summary, TaskStatus, Translation,
    UploadResponse,
};
use paperdesk_core::{Message, PaperStore, Role};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

fn status_label(status: TaskStatus, color: ColorMode) -> String {
    if !color.enabled() {
        return status.to_string().to_uppercase();
    }
    let label = status.to_string().to_uppercase();
    match status {
        TaskStatus::Completed => label.green().to_string(),
        TaskStatus::Failed => label.red().to_string(),
        TaskStatus::Pending | TaskStatus::Processing => label.yellow().to_string(),
    }
}

pub fn print_error(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "ERROR:".red().bold(), message)
    } else {
        writeln!(w, "ERROR: {}", message)
    }
}

pub fn print_task_created(
    w: &mut dyn Write,
    resp: &UploadResponse,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(
        w,
        "Task {} [{}] {}",
        resp.task_id,
        status_label(resp.status, color),
        resp.message
    )
}

pub fn print_parse_status(
    w: &mut dyn Write,
    status: &ParseStatus,
    color: ColorMode,
) -> std::io::Result<()> {
    write!(
        w,
        "Task {} [{}]",
        status.task_id,
        status_label(status.status, color)
    )?;
    if let Some(progress) = status.progress {
        write!(w, " {}%", progress)?;
    }
    writeln!(w)?;
    if let Some(ref paper_id) = status.paper_id {
        writeln!(w, "  Paper:  {}", paper_id)?;
    }
    if let Some(title) = status.metadata.as_ref().and_then(|m| m.title.as_deref()) {
        writeln!(w, "  Title:  {}", title)?;
    }
    if let Some(ref error) = status.error {
        print_error(w, error, color)?;
    }
    Ok(())
}

/// Home / history view: parsed papers, most recently modified first.
pub fn print_paper_list(w: &mut dyn Write, list: &PaperList, color: ColorMode) -> std::io::Result<()> {
    if list.papers.is_empty() {
        writeln!(w, "No papers yet. Upload one with: paperdesk upload <file.pdf>")?;
        return Ok(());
    }

    let mut papers = list.papers.clone();
    papers.sort_by(|a, b| {
        b.modified_at
            .unwrap_or(0.0)
            .total_cmp(&a.modified_at.unwrap_or(0.0))
    });

    writeln!(w, "{} paper(s)", list.total.max(papers.len()))?;
    writeln!(w)?;
    for paper in &papers {
        let title = paper.title.as_deref().unwrap_or("(untitled)");
        if color.enabled() {
            writeln!(w, "{}  {}", paper.paper_id.dimmed(), title.bold())?;
        } else {
            writeln!(w, "{}  {}", paper.paper_id, title)?;
        }
        if !paper.authors.is_empty() {
            writeln!(w, "    {}", truncate(&paper.authors.join(", "), 80))?;
        }
        if let Some(modified) = paper
            .modified_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0))
        {
            writeln!(w, "    modified {}", modified.format("%Y-%m-%d %H:%M"))?;
        }
    }
    Ok(())
}

fn print_metadata(w: &mut dyn Write, meta: &PaperMetadata, color: ColorMode) -> std::io::Result<()> {
    let title = meta.title.as_deref().unwrap_or("(untitled)");
    if color.enabled() {
        writeln!(w, "{}", title.bold())?;
    } else {
        writeln!(w, "{}", title)?;
    }
    if let Some(ref authors) = meta.authors
        && !authors.is_empty()
    {
        writeln!(w, "Authors:  {}", authors.join(", "))?;
    }
    if let Some(ref date) = meta.publication_date {
        writeln!(w, "Date:     {}", date)?;
    }
    if let Some(ref source) = meta.source {
        writeln!(w, "Source:   {}", source)?;
    }
    if let Some(ref keywords) = meta.keywords
        && !keywords.is_empty()
    {
        writeln!(w, "Keywords: {}", keywords.join(", "))?;
    }
    if let Some(ref abstract_text) = meta.abstract_text {
        writeln!(w)?;
        writeln!(w, "{}", truncate(abstract_text, 600))?;
    }
    Ok(())
}

/// Paper detail view, rendered from the paper store.
pub fn print_paper_view(
    w: &mut dyn Write,
    papers: &PaperStore,
    full: bool,
    color: ColorMode,
) -> std::io::Result<()> {
    if let Some(error) = papers.error() {
        return print_error(w, &error, color);
    }
    let Some(paper) = papers.paper() else {
        return writeln!(w, "No paper loaded.");
    };

    match papers.metadata() {
        Some(meta) => print_metadata(w, &meta, color)?,
        None => writeln!(w, "{}", paper.paper_id)?,
    }
    writeln!(w)?;

    if !paper.sections.is_empty() {
        writeln!(w, "Sections:")?;
        let mut sections = paper.sections.clone();
        sections.sort_by_key(|s| s.order);
        for section in &sections {
            let indent = "  ".repeat(section.level.max(1) as usize);
            writeln!(w, "{}{}", indent, section.title)?;
        }
        writeln!(w)?;
    }

    let flag = |present: bool| if present { "available" } else { "not available" };
    writeln!(w, "Translation: {}", flag(papers.has_translation()))?;
    writeln!(w, "Summary:     {}", flag(papers.has_summary()))?;

    if let Some(summary) = papers.summary() {
        writeln!(w)?;
        print_summary(w, &summary, color)?;
    }
    if full {
        if let Some(translation) = papers.translation() {
            writeln!(w)?;
            print_translation(w, &translation, color)?;
        } else {
            writeln!(w)?;
            writeln!(w, "{}", paper.full_content)?;
        }
    }
    Ok(())
}

pub fn print_summary(w: &mut dyn Write, summary: &Summary, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", "Summary".bold().cyan())?;
    } else {
        writeln!(w, "Summary")?;
    }
    writeln!(w, "{}", summary.overall_summary)?;
    if !summary.key_points.is_empty() {
        writeln!(w)?;
        writeln!(w, "Key points:")?;
        for point in &summary.key_points {
            writeln!(w, "  - {}", point)?;
        }
    }
    if let Some(ref methodology) = summary.methodology {
        writeln!(w)?;
        writeln!(w, "Methodology: {}", methodology)?;
    }
    if let Some(ref contributions) = summary.contributions {
        writeln!(w, "Contributions: {}", contributions)?;
    }
    for section in &summary.section_summaries {
        writeln!(w)?;
        writeln!(w, "[{}] {}", section.section_title, section.summary)?;
    }
    Ok(())
}

pub fn print_translation(
    w: &mut dyn Write,
    translation: &Translation,
    color: ColorMode,
) -> std::io::Result<()> {
    let mut last_section: Option<&str> = None;
    for segment in &translation.segments {
        let section = segment.section_title.as_deref();
        if section.is_some() && section != last_section {
            let title = section.unwrap_or_default();
            if color.enabled() {
                writeln!(w, "\n{}", title.bold())?;
            } else {
                writeln!(w, "\n{}", title)?;
            }
            last_section = section;
        }
        writeln!(w, "{}", segment.translated)?;
    }
    Ok(())
}

pub fn print_message(w: &mut dyn Write, message: &Message, color: ColorMode) -> std::io::Result<()> {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    if color.enabled() {
        let who = match message.role {
            Role::User => who.blue().bold().to_string(),
            Role::Assistant => who.green().bold().to_string(),
        };
        writeln!(w, "{} {}", who, message.timestamp.format("%H:%M").dimmed())?;
    } else {
        writeln!(w, "{} {}", who, message.timestamp.format("%H:%M"))?;
    }
    writeln!(w, "{}", message.content)?;
    if let Some(ref sources) = message.sources
        && !sources.is_empty()
    {
        let line = format!("({} source passage(s))", sources.len());
        if color.enabled() {
            writeln!(w, "{}", line.dimmed())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }
    writeln!(w)
}

pub fn print_history(w: &mut dyn Write, history: &ChatHistory, color: ColorMode) -> std::io::Result<()> {
    writeln!(w, "Session {} ({} messages)", history.session_id, history.messages.len())?;
    writeln!(w)?;
    for entry in &history.messages {
        let role = if color.enabled() {
            entry.role.bold().to_string()
        } else {
            entry.role.clone()
        };
        match entry.timestamp {
            Some(ref ts) => writeln!(w, "{} {}", role, ts)?,
            None => writeln!(w, "{}", role)?,
        }
        writeln!(w, "{}", entry.content)?;
        writeln!(w)?;
    }
    Ok(())
}
