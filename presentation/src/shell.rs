use crate::render::{print_answer, print_error, print_report, print_warning};
use application::context::{AnswerBackend, AppContext};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use domain::models::{Answer, IngestReport, ScoredChunk};
use infrastructure::search::VectorIndex;
use shared::progress::Busy;
use shared::types::Result;
use std::path::{Path, PathBuf};

pub const NO_DOCUMENTS: &str = "No documents loaded yet.";
pub const EMPTY_QUESTION: &str = "Please type a question first.";
pub const EMPTY_CORPUS: &str =
    "The loaded corpus has no indexed text; upload or ingest some PDFs first.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusSource {
    Preloaded,
    Uploaded { files: usize },
}

pub enum ShellState {
    NoIndex,
    Loaded {
        source: CorpusSource,
        index: VectorIndex,
    },
}

pub enum AskOutcome {
    Warning(String),
    Answered {
        answer: Answer,
        retrieved: Vec<ScoredChunk>,
    },
}

const MENU: [&str; 5] = [
    "Use preloaded papers",
    "Upload my own PDFs",
    "Ask a question",
    "Switch answer mode",
    "Quit",
];

pub struct Shell<'a> {
    context: &'a AppContext,
    state: ShellState,
    backend: AnswerBackend,
}

impl<'a> Shell<'a> {
    pub fn new(context: &'a AppContext, backend: AnswerBackend) -> Self {
        Self {
            context,
            state: ShellState::NoIndex,
            backend,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn backend(&self) -> AnswerBackend {
        self.backend
    }

    pub fn toggle_backend(&mut self) -> AnswerBackend {
        self.backend = self.backend.toggled();
        self.backend
    }

    /// Load the persisted index. On failure the current state is kept.
    pub fn load_preloaded(&mut self) -> Result<usize> {
        let index = self.context.load_preloaded()?;
        let chunks = index.len();
        self.state = ShellState::Loaded {
            source: CorpusSource::Preloaded,
            index,
        };
        Ok(chunks)
    }

    /// Discard any loaded corpus and index `files` from scratch.
    pub async fn rebuild_from_uploads(&mut self, files: &[PathBuf]) -> Result<IngestReport> {
        self.state = ShellState::NoIndex;
        let busy = Busy::start("Indexing uploaded PDFs (this may take a bit)...");
        let built = self.context.build_from_uploads(files).await;
        busy.finish();
        let (index, report) = built?;
        self.state = ShellState::Loaded {
            source: CorpusSource::Uploaded { files: files.len() },
            index,
        };
        Ok(report)
    }

    /// Retrieve and answer. Every failure comes back as a warning.
    pub async fn ask(&self, question: &str) -> AskOutcome {
        let ShellState::Loaded { index, .. } = &self.state else {
            return AskOutcome::Warning(NO_DOCUMENTS.to_string());
        };
        let question = question.trim();
        if question.is_empty() {
            return AskOutcome::Warning(EMPTY_QUESTION.to_string());
        }
        if index.is_empty() {
            return AskOutcome::Warning(EMPTY_CORPUS.to_string());
        }

        let busy = Busy::start("Searching papers...");
        let retrieved = self.context.retrieve(index, question).await;
        busy.finish();
        let retrieved = match retrieved {
            Ok(chunks) => chunks,
            Err(err) => return AskOutcome::Warning(format!("Search failed: {err:#}")),
        };

        let busy = Busy::start("Generating answer...");
        let answer = self.context.answer(self.backend, question, &retrieved).await;
        busy.finish();
        AskOutcome::Answered { answer, retrieved }
    }

    /// Menu loop; returns when the user quits or the terminal goes away.
    pub async fn run(&mut self) -> Result<()> {
        let theme = ColorfulTheme::default();
        println!("{}", "Machine Learning Research Q&A".green().bold());
        println!("Ask questions based on research papers (preloaded or uploaded).");
        if self.backend == AnswerBackend::Llm && !self.context.llm_configured() {
            print_warning("No GEMINI_API_KEY set: answers will explain how to configure the model.");
        }

        loop {
            println!("\n{}", self.status_line().dimmed());
            let choice = Select::with_theme(&theme)
                .with_prompt("What next?")
                .items(&MENU)
                .default(if matches!(self.state, ShellState::NoIndex) { 0 } else { 2 })
                .interact()?;

            match choice {
                0 => match self.load_preloaded() {
                    Ok(chunks) => println!(
                        "{}",
                        format!("Loaded preloaded papers ({chunks} chunks).").green()
                    ),
                    Err(err) => print_error(&err),
                },
                1 => {
                    let input: String = Input::with_theme(&theme)
                        .with_prompt("PDF paths (comma separated)")
                        .allow_empty(true)
                        .interact_text()?;
                    let files = parse_paths(&input);
                    if files.is_empty() {
                        print_warning("No files given.");
                        continue;
                    }
                    match self.rebuild_from_uploads(&files).await {
                        Ok(report) => {
                            print_report(&report);
                            println!("{}", "Uploaded PDFs indexed successfully!".green());
                        }
                        Err(err) => print_error(&err),
                    }
                }
                2 => {
                    let question: String = Input::with_theme(&theme)
                        .with_prompt("Ask a question")
                        .allow_empty(true)
                        .interact_text()?;
                    match self.ask(&question).await {
                        AskOutcome::Warning(message) => print_warning(&message),
                        AskOutcome::Answered { answer, .. } => print_answer(&answer),
                    }
                }
                3 => {
                    let backend = self.toggle_backend();
                    println!("Answer mode: {}", backend.label().cyan());
                }
                _ => return Ok(()),
            }
        }
    }

    fn status_line(&self) -> String {
        let corpus = match &self.state {
            ShellState::NoIndex => "no documents loaded".to_string(),
            ShellState::Loaded { source: CorpusSource::Preloaded, index } => {
                format!("preloaded papers, {} chunks", index.len())
            }
            ShellState::Loaded { source: CorpusSource::Uploaded { files }, index } => {
                format!("{files} uploaded PDFs, {} chunks", index.len())
            }
        };
        format!("[{corpus} | answers: {}]", self.backend.label())
    }
}

/// Split comma separated input; a segment that is not an existing path is
/// split further on whitespace.
pub fn parse_paths(input: &str) -> Vec<PathBuf> {
    input
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .flat_map(|segment| {
            let segment = segment.trim_matches(|c: char| c == '"' || c == '\'');
            if Path::new(segment).exists() {
                vec![PathBuf::from(segment)]
            } else {
                segment.split_whitespace().map(PathBuf::from).collect()
            }
        })
        .collect()
}
