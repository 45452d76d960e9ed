use crate::render::{print_answer, print_report, print_warning};
use crate::shell::{AskOutcome, Shell};
use anyhow::bail;
use application::context::{AnswerBackend, AppContext};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use infrastructure::config::Config;
use shared::confirmation::ask_confirmation;
use shared::progress::Busy;
use shared::telemetry::Telemetry;
use shared::types::Result;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "paperqa")]
#[command(about = "Question answering over a corpus of research papers")]
pub struct Cli {
    /// Log debug detail to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the preloaded index from a directory of PDFs
    Ingest(IngestArgs),
    /// Answer one question against the preloaded index
    Ask(AskArgs),
    /// Interactive session (the default)
    Shell(ShellArgs),
}

#[derive(Args, Default)]
pub struct IngestArgs {
    /// Directory scanned recursively for PDFs
    #[arg(long)]
    pub papers: Option<PathBuf>,

    /// Where the index is written
    #[arg(long)]
    pub out: Option<PathBuf>,

    #[arg(long)]
    pub chunk_size: Option<usize>,

    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Overwrite an existing index without asking
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args)]
pub struct AskArgs {
    /// Quote retrieved passages instead of calling the language model
    #[arg(long)]
    pub offline: bool,

    /// Number of chunks to retrieve
    #[arg(short, long)]
    pub k: Option<usize>,

    #[arg(required = true, trailing_var_arg = true)]
    pub question: Vec<String>,
}

#[derive(Args, Default)]
pub struct ShellArgs {
    #[arg(long)]
    pub offline: bool,
}

impl Command {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        match self {
            Command::Ingest(args) => {
                if let Some(papers) = &args.papers {
                    config.papers_dir = papers.clone();
                }
                if let Some(out) = &args.out {
                    config.vectorstore_path = out.clone();
                }
                if let Some(size) = args.chunk_size {
                    config.chunk_size = size;
                }
                if let Some(overlap) = args.chunk_overlap {
                    config.chunk_overlap = overlap;
                }
            }
            Command::Ask(args) => {
                if let Some(k) = args.k {
                    config.top_k = k;
                }
            }
            Command::Shell(_) => {}
        }
    }
}

fn backend(offline: bool) -> AnswerBackend {
    if offline {
        AnswerBackend::Offline
    } else {
        AnswerBackend::Llm
    }
}

pub struct CliApp {
    context: AppContext,
}

impl CliApp {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            context: AppContext::initialize(config)?,
        })
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Ingest(args) => self.handle_ingest(&args).await,
            Command::Ask(args) => self.handle_ask(&args).await,
            Command::Shell(args) => Shell::new(&self.context, backend(args.offline)).run().await,
        }
    }

    async fn handle_ingest(&self, args: &IngestArgs) -> Result<()> {
        let config = self.context.config();
        let storage = self.context.storage();
        if storage.exists() && !args.yes {
            let prompt = format!(
                "An index already exists at {}. Replace it?",
                storage.dir().display()
            );
            if !ask_confirmation(&prompt, false)? {
                println!("{}", "Ingestion cancelled.".yellow());
                return Ok(());
            }
        }

        println!(
            "Indexing {} with {}...",
            config.papers_dir.display(),
            self.context.embedder().model_name()
        );
        let telemetry = Telemetry::new();
        let busy = Busy::start("Building index...");
        let report = self.context.ingest_preloaded().await;
        busy.finish();
        let report = report?;
        print_report(&report);
        println!(
            "Saved to {} in {:.1}s.",
            storage.dir().display(),
            telemetry.elapsed().as_secs_f64()
        );
        if report.chunks == 0 {
            print_warning("No text was extracted; questions will find nothing.");
        }
        Ok(())
    }

    async fn handle_ask(&self, args: &AskArgs) -> Result<()> {
        let mut shell = Shell::new(&self.context, backend(args.offline));
        shell.load_preloaded()?;
        match shell.ask(&args.question.join(" ")).await {
            AskOutcome::Answered { answer, .. } => {
                print_answer(&answer);
                Ok(())
            }
            AskOutcome::Warning(message) => bail!(message),
        }
    }
}
