use domain::errors::LlmError;
use domain::llm::LanguageModel;
use domain::models::{Answer, AnswerMode, Citation, ScoredChunk};
use shared::utils::{normalize_whitespace, truncate_chars};

pub const NO_INFORMATION: &str = "No relevant information found in the provided papers.";
pub const NOT_FOUND_IN_PAPERS: &str = "Not found in the provided papers.";
/// Excerpt length kept on each citation for the Sources list.
pub const CITATION_EXCERPT_CHARS: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerSettings {
    /// Chunks quoted by the offline answer.
    pub max_quoted: usize,
    /// Characters kept from each quoted chunk.
    pub excerpt_chars: usize,
    /// Budget for the context block sent to the language model.
    pub max_context_chars: usize,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            max_quoted: 3,
            excerpt_chars: 300,
            max_context_chars: 12_000,
        }
    }
}

/// Formats retrieved passages directly; never calls a model.
#[derive(Debug, Clone, Default)]
pub struct OfflineAnswerer {
    settings: AnswerSettings,
}

impl OfflineAnswerer {
    pub fn new(settings: AnswerSettings) -> Self {
        Self { settings }
    }

    pub fn answer(&self, question: &str, chunks: &[ScoredChunk]) -> Answer {
        Answer {
            body: self.body(question, chunks),
            citations: citations(chunks),
            mode: if chunks.is_empty() {
                AnswerMode::NoContext
            } else {
                AnswerMode::Offline
            },
            notice: None,
        }
    }

    fn body(&self, question: &str, chunks: &[ScoredChunk]) -> String {
        if chunks.is_empty() {
            return NO_INFORMATION.to_string();
        }
        let mut lines = vec![
            format!("Question: {}", neutralize_markers(&normalize_whitespace(question))),
            String::new(),
            "Evidence from the papers:".to_string(),
        ];
        for (i, scored) in chunks.iter().take(self.settings.max_quoted).enumerate() {
            let chunk = &scored.chunk;
            let excerpt = truncate_chars(
                &neutralize_markers(&normalize_whitespace(&chunk.text)),
                self.settings.excerpt_chars,
            );
            lines.push(format!(
                "[{}] \"{}\" ({}, {})",
                i + 1,
                excerpt,
                chunk.source_name(),
                chunk.page_label()
            ));
        }
        lines.push(String::new());
        lines.push(
            "Note: passages are quoted as retrieved; no language model was used to write this answer."
                .to_string(),
        );
        lines.join("\n")
    }
}

/// Sends the question and retrieved passages to a language model, falling
/// back to [`OfflineAnswerer`] output when the model cannot answer.
pub struct LlmAnswerer<L> {
    model: L,
    settings: AnswerSettings,
    offline: OfflineAnswerer,
}

impl<L: LanguageModel> LlmAnswerer<L> {
    pub fn new(model: L, settings: AnswerSettings) -> Self {
        Self {
            model,
            settings,
            offline: OfflineAnswerer::new(settings),
        }
    }

    pub fn model(&self) -> &L {
        &self.model
    }

    pub async fn answer(&self, question: &str, chunks: &[ScoredChunk]) -> Answer {
        if chunks.is_empty() {
            return self.offline.answer(question, chunks);
        }
        let prompt = build_prompt(question, &self.build_context(chunks));
        match self.model.generate(&prompt).await {
            Ok(body) => Answer {
                body,
                citations: citations(chunks),
                mode: AnswerMode::Llm,
                notice: None,
            },
            Err(LlmError::NotConfigured { env_var }) => Answer {
                body: format!(
                    "LLM is not configured: set {env_var} to enable model answers, or switch to offline mode."
                ),
                citations: citations(chunks),
                mode: AnswerMode::NotConfigured,
                notice: None,
            },
            Err(err) => {
                tracing::warn!(model = self.model.name(), error = %err, "language model unavailable, answering offline");
                let mut answer = self.offline.answer(question, chunks);
                answer.notice = Some(fallback_notice(&err));
                answer
            }
        }
    }

    /// `[i] (file, page p) text` blocks within the context budget. The first
    /// block is always present, cut to the budget if needed.
    pub fn build_context(&self, chunks: &[ScoredChunk]) -> String {
        let budget = self.settings.max_context_chars;
        let mut context = String::new();
        let mut used = 0;
        for (i, scored) in chunks.iter().enumerate() {
            let chunk = &scored.chunk;
            let block = format!(
                "[{}] ({}, {}) {}",
                i + 1,
                chunk.source_name(),
                chunk.page_label(),
                normalize_whitespace(&chunk.text)
            );
            let block_chars = block.chars().count();
            if i == 0 {
                let first = if block_chars > budget {
                    block.chars().take(budget).collect()
                } else {
                    block
                };
                used = first.chars().count();
                context = first;
                continue;
            }
            // Two chars for the blank line separating blocks.
            if used + 2 + block_chars > budget {
                tracing::debug!(dropped = chunks.len() - i, "context budget reached");
                break;
            }
            context.push_str("\n\n");
            context.push_str(&block);
            used += 2 + block_chars;
        }
        context
    }
}

/// User-facing reason for an offline fallback. Transient failures are worth
/// retrying; anything else needs the configuration looked at.
pub fn fallback_notice(err: &LlmError) -> String {
    if err.is_transient() {
        format!(
            "Primary model temporarily unavailable ({err}); showing retrieved passages instead. Try again later."
        )
    } else {
        format!(
            "Primary model rejected the request ({err}); showing retrieved passages instead. Check the API key and model name."
        )
    }
}

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a helpful assistant answering questions ONLY using the provided sources.

Rules:
- If the answer is not present in the sources, say exactly: \"{NOT_FOUND_IN_PAPERS}\"
- Keep the answer short (5-8 lines max).
- Cite the sources you use like [1], [2].
- Do NOT use outside knowledge.

SOURCES:
{context}

QUESTION:
{question}

ANSWER:
"
    )
}

/// Rewrite bracketed reference numbers (`[3]`, `[1, 2]`, `[4-6]`) as `(3)`
/// so the only `[n]` markers in an offline answer are its own.
fn neutralize_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) if is_reference_list(&after[..close]) => {
                out.push('(');
                out.push_str(&after[..close]);
                out.push(')');
                rest = &after[close + 1..];
            }
            _ => {
                out.push('[');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn is_reference_list(inner: &str) -> bool {
    inner.chars().any(|c| c.is_ascii_digit())
        && inner
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ',' | '-' | ' '))
}

/// One citation per retrieved chunk, numbered from 1.
pub fn citations(chunks: &[ScoredChunk]) -> Vec<Citation> {
    chunks
        .iter()
        .enumerate()
        .map(|(i, scored)| Citation {
            index: i + 1,
            source: scored.chunk.source_name(),
            page: scored.chunk.page,
            excerpt: truncate_chars(scored.chunk.text.trim(), CITATION_EXCERPT_CHARS),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::Chunk;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scored(position: usize, text: &str, page: Option<u32>) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: format!("c{position}"),
                text: text.to_string(),
                source: PathBuf::from(format!("data/papers/paper{position}.pdf")),
                page,
                position,
                start: 0,
            },
            score: 1.0 - position as f32 * 0.1,
        }
    }

    struct StubModel {
        reply: Result<String, LlmError>,
        calls: AtomicUsize,
    }

    impl StubModel {
        fn new(reply: Result<String, LlmError>) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LanguageModel for StubModel {
        fn name(&self) -> &str {
            "stub"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    fn marker_count(body: &str) -> usize {
        (1..=10).filter(|i| body.contains(&format!("[{i}]"))).count()
    }

    #[test]
    fn offline_without_chunks_says_nothing_was_found() {
        let answer = OfflineAnswerer::default().answer("anything?", &[]);
        assert_eq!(answer.body, NO_INFORMATION);
        assert_eq!(answer.mode, AnswerMode::NoContext);
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn offline_quotes_at_most_three_chunks_with_one_marker_each() {
        let chunks: Vec<ScoredChunk> = (0..4)
            .map(|i| scored(i, &format!("Finding number {i}."), Some(i as u32 + 1)))
            .collect();
        let answer = OfflineAnswerer::default().answer("What was found?", &chunks);
        assert_eq!(answer.mode, AnswerMode::Offline);
        assert_eq!(marker_count(&answer.body), 3);
        for i in 1..=3 {
            assert_eq!(answer.body.matches(&format!("[{i}]")).count(), 1);
        }
        assert!(answer.body.contains("[1] \"Finding number 0.\" (paper0.pdf, page 1)"));
        assert_eq!(answer.citations.len(), 4);
    }

    #[test]
    fn offline_truncates_long_chunks_and_marks_missing_pages() {
        let long = "word ".repeat(200);
        let answer = OfflineAnswerer::default().answer("q", &[scored(0, &long, None)]);
        assert!(answer.body.contains("...\" (paper0.pdf, page ?)"));
        let quoted_line = answer.body.lines().find(|l| l.starts_with("[1]")).unwrap();
        assert!(quoted_line.chars().count() < 340);
    }

    #[test]
    fn reference_brackets_in_papers_do_not_add_markers() {
        let chunks = vec![
            scored(0, "Transformers [2] beat RNNs.", Some(1)),
            scored(1, "BERT [1] uses masking.", Some(2)),
        ];
        let answer = OfflineAnswerer::default().answer("What does [1] report?", &chunks);
        assert_eq!(answer.body.matches("[1]").count(), 1);
        assert_eq!(answer.body.matches("[2]").count(), 1);
        assert!(answer.body.contains("\"Transformers (2) beat RNNs.\""));
        assert!(answer.body.contains("What does (1) report?"));
    }

    #[test]
    fn only_numeric_brackets_are_rewritten() {
        assert_eq!(neutralize_markers("see [1, 2] and [4-6]"), "see (1, 2) and (4-6)");
        assert_eq!(neutralize_markers("matrix [a] and [ ] stay"), "matrix [a] and [ ] stay");
        assert_eq!(neutralize_markers("open [3 without close"), "open [3 without close");
        assert_eq!(neutralize_markers("[[7]]"), "[(7)]");
    }

    #[tokio::test]
    async fn successful_model_reply_is_used_verbatim() {
        let answerer = LlmAnswerer::new(
            StubModel::new(Ok("The sky is blue [1].".into())),
            AnswerSettings::default(),
        );
        let chunks = vec![scored(0, "The sky is blue.", Some(1))];
        let answer = answerer.answer("What color is the sky?", &chunks).await;
        assert_eq!(answer.body, "The sky is blue [1].");
        assert_eq!(answer.mode, AnswerMode::Llm);
        assert_eq!(answer.citations.len(), 1);
    }

    #[tokio::test]
    async fn every_provider_failure_falls_back_to_the_exact_offline_answer() {
        let chunks = vec![
            scored(0, "The sky is blue.", Some(1)),
            scored(1, "Grass is green.", Some(2)),
        ];
        let question = "What color is the sky?";
        let expected = OfflineAnswerer::default().answer(question, &chunks);

        for err in [
            LlmError::Transport { provider: "stub".into(), message: "timed out".into() },
            LlmError::Provider { provider: "stub".into(), status: 429, message: "quota".into() },
            LlmError::Provider { provider: "stub".into(), status: 403, message: "bad key".into() },
            LlmError::EmptyResponse { provider: "stub".into() },
        ] {
            let answerer = LlmAnswerer::new(StubModel::new(Err(err)), AnswerSettings::default());
            let answer = answerer.answer(question, &chunks).await;
            assert_eq!(answer.body, expected.body);
            assert_eq!(answer.citations, expected.citations);
            assert_eq!(answer.mode, AnswerMode::Offline);
            assert!(answer.notice.is_some());
        }
    }

    #[tokio::test]
    async fn fallback_notice_separates_outages_from_rejections() {
        let chunks = vec![scored(0, "The sky is blue.", Some(1))];
        let outage = LlmError::Provider { provider: "stub".into(), status: 503, message: "busy".into() };
        let rejected = LlmError::Provider { provider: "stub".into(), status: 403, message: "bad key".into() };

        let answerer = LlmAnswerer::new(StubModel::new(Err(outage)), AnswerSettings::default());
        let notice = answerer.answer("q", &chunks).await.notice.unwrap();
        assert!(notice.contains("temporarily unavailable"));

        let answerer = LlmAnswerer::new(StubModel::new(Err(rejected)), AnswerSettings::default());
        let notice = answerer.answer("q", &chunks).await.notice.unwrap();
        assert!(notice.contains("Check the API key"));
    }

    #[tokio::test]
    async fn missing_credential_is_reported_not_hidden() {
        let answerer = LlmAnswerer::new(
            StubModel::new(Err(LlmError::NotConfigured { env_var: "GEMINI_API_KEY" })),
            AnswerSettings::default(),
        );
        let answer = answerer.answer("q", &[scored(0, "text", Some(1))]).await;
        assert_eq!(answer.mode, AnswerMode::NotConfigured);
        assert!(answer.body.contains("GEMINI_API_KEY"));
        assert_eq!(answer.citations.len(), 1);
        assert!(answer.notice.is_none());
    }

    #[tokio::test]
    async fn no_chunks_means_no_model_call() {
        let answerer = LlmAnswerer::new(StubModel::new(Ok("x".into())), AnswerSettings::default());
        let answer = answerer.answer("q", &[]).await;
        assert_eq!(answer.body, NO_INFORMATION);
        assert_eq!(answerer.model().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn context_respects_the_budget_but_keeps_the_first_block() {
        let settings = AnswerSettings {
            max_context_chars: 60,
            ..AnswerSettings::default()
        };
        let answerer = LlmAnswerer::new(StubModel::new(Ok(String::new())), settings);
        let chunks = vec![
            scored(0, "alpha beta", Some(1)),
            scored(1, "gamma delta", Some(2)),
            scored(2, &"x".repeat(500), Some(3)),
        ];
        let context = answerer.build_context(&chunks);
        assert!(context.starts_with("[1] (paper0.pdf, page 1) alpha beta"));
        assert!(!context.contains("[2]"));
        assert!(context.chars().count() <= 60);

        let tiny = LlmAnswerer::new(
            StubModel::new(Ok(String::new())),
            AnswerSettings { max_context_chars: 10, ..AnswerSettings::default() },
        );
        assert_eq!(tiny.build_context(&chunks), "[1] (paper");
    }

    #[test]
    fn prompt_carries_the_decline_phrase_and_sources() {
        let prompt = build_prompt("Why?", "[1] (a.pdf, page 1) because");
        assert!(prompt.contains(NOT_FOUND_IN_PAPERS));
        assert!(prompt.contains("[1] (a.pdf, page 1) because"));
        assert!(prompt.contains("QUESTION:\nWhy?"));
    }
}
