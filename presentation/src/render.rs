use colored::Colorize;
use domain::models::{Answer, AnswerMode, Citation, IngestReport};

pub fn print_answer(answer: &Answer) {
    let heading = match answer.mode {
        AnswerMode::Llm => "Answer",
        AnswerMode::Offline => "Answer (offline)",
        AnswerMode::NotConfigured => "Answer unavailable",
        AnswerMode::NoContext => "Answer",
    };
    println!("\n{}", heading.green().bold());
    println!("{}", answer.body);
    if let Some(notice) = &answer.notice {
        println!("\n{}", notice.yellow());
    }
    if answer.citations.is_empty() {
        return;
    }
    println!("\n{}", "Sources".green().bold());
    for citation in &answer.citations {
        println!("{}", source_line(citation).blue());
        println!("  {}", citation.excerpt.dimmed());
    }
}

/// Header line of one entry in the Sources list.
pub fn source_line(citation: &Citation) -> String {
    format!(
        "Source {}: {} — {}",
        citation.index,
        citation.source,
        citation.page_label()
    )
}

pub fn print_warning(message: &str) {
    println!("{}", message.yellow());
}

pub fn print_error(err: &anyhow::Error) {
    println!("{} {:#}", "Error:".red().bold(), err);
}

pub fn print_report(report: &IngestReport) {
    println!(
        "{}",
        format!(
            "Indexed {} chunks from {} pages ({} files, {} skipped).",
            report.chunks, report.documents, report.files_seen, report.files_skipped
        )
        .green()
    );
}
