use application::context::{AnswerBackend, AppContext};
use application::rag_service::{IngestionPipeline, Retriever};
use domain::errors::IndexError;
use domain::models::{AnswerMode, Document};
use infrastructure::chunker::{SplitStrategy, TextChunker};
use infrastructure::embedding_storage::EmbeddingStorage;
use presentation::shell::{
    AskOutcome, CorpusSource, Shell, ShellState, EMPTY_CORPUS, EMPTY_QUESTION, NO_DOCUMENTS,
};
use tests::{ingested_context, papers_dir, test_config, write_single_page_pdf};

#[tokio::test]
async fn one_page_paper_is_quoted_with_its_citation() {
    let root = tempfile::tempdir().unwrap();
    let context = ingested_context(root.path(), &[("sky.pdf", "The sky is blue.")])
        .await
        .unwrap();

    let mut shell = Shell::new(&context, AnswerBackend::Offline);
    assert_eq!(shell.load_preloaded().unwrap(), 1);

    let AskOutcome::Answered { answer, retrieved } = shell.ask("What color is the sky?").await else {
        panic!("expected an answer");
    };
    assert_eq!(retrieved.len(), 1);
    assert!(retrieved[0].chunk.text.contains("The sky is blue."));
    assert_eq!(retrieved[0].chunk.page, Some(1));
    assert_eq!(answer.mode, AnswerMode::Offline);
    assert!(answer.body.contains("[1] \"The sky is blue.\" (sky.pdf, page 1)"));
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].source, "sky.pdf");
}

#[tokio::test]
async fn empty_corpus_warns_instead_of_answering() {
    let root = tempfile::tempdir().unwrap();
    let context = ingested_context(root.path(), &[]).await.unwrap();

    let mut shell = Shell::new(&context, AnswerBackend::Offline);
    assert_eq!(shell.load_preloaded().unwrap(), 0);
    match shell.ask("What color is the sky?").await {
        AskOutcome::Warning(message) => assert_eq!(message, EMPTY_CORPUS),
        AskOutcome::Answered { .. } => panic!("empty corpus must not answer"),
    }
}

#[tokio::test]
async fn questions_are_rejected_until_documents_load() {
    let root = tempfile::tempdir().unwrap();
    let context = ingested_context(root.path(), &[("sky.pdf", "The sky is blue.")])
        .await
        .unwrap();
    let mut shell = Shell::new(&context, AnswerBackend::Offline);

    assert!(matches!(shell.state(), ShellState::NoIndex));
    match shell.ask("What color is the sky?").await {
        AskOutcome::Warning(message) => assert_eq!(message, NO_DOCUMENTS),
        AskOutcome::Answered { .. } => panic!("nothing is loaded"),
    }

    shell.load_preloaded().unwrap();
    match shell.ask("   ").await {
        AskOutcome::Warning(message) => assert_eq!(message, EMPTY_QUESTION),
        AskOutcome::Answered { .. } => panic!("blank question must not answer"),
    }
}

#[tokio::test]
async fn missing_preloaded_index_keeps_the_shell_usable() {
    let root = tempfile::tempdir().unwrap();
    let context = AppContext::initialize(test_config(root.path())).unwrap();
    let mut shell = Shell::new(&context, AnswerBackend::Offline);
    let err = shell.load_preloaded().unwrap_err();
    assert!(matches!(err.downcast_ref::<IndexError>(), Some(IndexError::NotFound { .. })));
    assert!(matches!(shell.state(), ShellState::NoIndex));
}

#[tokio::test]
async fn reloaded_index_ranks_like_the_built_one() {
    let root = tempfile::tempdir().unwrap();
    let context = AppContext::initialize(test_config(root.path())).unwrap();
    let documents: Vec<Document> = [
        "Transformers replace recurrence with self-attention over all tokens.",
        "Dropout randomly zeroes activations to reduce overfitting.",
        "Batch normalization rescales layer inputs using minibatch statistics.",
        "Self-attention cost grows quadratically with sequence length.",
        "Residual connections ease optimisation of very deep networks.",
    ]
    .iter()
    .enumerate()
    .map(|(i, text)| Document::new(format!("papers/p{i}.pdf"), Some(i as u32 + 1), *text))
    .collect();

    let chunker = TextChunker::new(120, 20, SplitStrategy::Recursive).unwrap();
    let built = IngestionPipeline::new(context.embedder(), chunker)
        .build_from_documents(&documents)
        .await
        .unwrap();
    let storage = EmbeddingStorage::new(root.path().join("store"));
    storage.save(&built).unwrap();
    let reloaded = storage.load(&context.embedder().model_name()).unwrap();

    let query = "how does self-attention scale with sequence length";
    let before = Retriever::new(&built, context.embedder(), 3).retrieve(query).await.unwrap();
    let after = Retriever::new(&reloaded, context.embedder(), 3).retrieve(query).await.unwrap();
    assert_eq!(before.len(), 3);
    assert_eq!(before, after);
}

#[tokio::test]
async fn index_built_by_another_embedder_is_refused() {
    let root = tempfile::tempdir().unwrap();
    ingested_context(root.path(), &[("sky.pdf", "The sky is blue.")])
        .await
        .unwrap();

    let mut config = test_config(root.path());
    config.hashing_dimensions = 128;
    let other = AppContext::initialize(config).unwrap();
    let err = other.load_preloaded().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<IndexError>(),
        Some(IndexError::ModelMismatch { .. })
    ));
}

#[tokio::test]
async fn llm_mode_without_a_key_explains_the_configuration() {
    let root = tempfile::tempdir().unwrap();
    let context = ingested_context(root.path(), &[("sky.pdf", "The sky is blue.")])
        .await
        .unwrap();
    let mut shell = Shell::new(&context, AnswerBackend::Llm);
    shell.load_preloaded().unwrap();

    let AskOutcome::Answered { answer, .. } = shell.ask("What color is the sky?").await else {
        panic!("expected an answer");
    };
    assert_eq!(answer.mode, AnswerMode::NotConfigured);
    assert!(answer.body.contains("GEMINI_API_KEY"));
    assert_eq!(answer.citations.len(), 1);
}

#[tokio::test]
async fn unreachable_model_falls_back_to_the_offline_answer() {
    let root = tempfile::tempdir().unwrap();
    ingested_context(root.path(), &[("sky.pdf", "The sky is blue.")])
        .await
        .unwrap();

    let mut config = test_config(root.path());
    config.gemini_api_key = Some("test-key".into());
    config.gemini_base_url = "http://127.0.0.1:9".into();
    let context = AppContext::initialize(config).unwrap();

    let mut llm_shell = Shell::new(&context, AnswerBackend::Llm);
    llm_shell.load_preloaded().unwrap();
    let mut offline_shell = Shell::new(&context, AnswerBackend::Offline);
    offline_shell.load_preloaded().unwrap();

    let question = "What color is the sky?";
    let (
        AskOutcome::Answered { answer: fallback, .. },
        AskOutcome::Answered { answer: offline, .. },
    ) = (llm_shell.ask(question).await, offline_shell.ask(question).await)
    else {
        panic!("expected answers");
    };
    assert_eq!(fallback.body, offline.body);
    assert_eq!(fallback.citations, offline.citations);
    assert!(fallback.notice.is_some());
}

#[tokio::test]
async fn uploads_replace_the_previous_corpus() {
    let root = tempfile::tempdir().unwrap();
    let context = AppContext::initialize(test_config(root.path())).unwrap();
    let incoming = root.path().join("incoming");
    write_single_page_pdf(&incoming.join("first.pdf"), "Convolutions share weights.").unwrap();
    write_single_page_pdf(&incoming.join("second.pdf"), "Pooling reduces resolution.").unwrap();
    write_single_page_pdf(&incoming.join("third.pdf"), "The sky is blue.").unwrap();

    let mut shell = Shell::new(&context, AnswerBackend::Offline);
    let report = shell
        .rebuild_from_uploads(&[incoming.join("first.pdf"), incoming.join("second.pdf")])
        .await
        .unwrap();
    assert_eq!(report.files_seen, 2);
    assert!(matches!(
        shell.state(),
        ShellState::Loaded { source: CorpusSource::Uploaded { files: 2 }, .. }
    ));

    shell.rebuild_from_uploads(&[incoming.join("third.pdf")]).await.unwrap();
    let upload_dir = &context.config().upload_dir;
    assert!(upload_dir.join("third.pdf").exists());
    assert!(!upload_dir.join("first.pdf").exists());

    let AskOutcome::Answered { retrieved, .. } = shell.ask("What color is the sky?").await else {
        panic!("expected an answer");
    };
    assert_eq!(retrieved.len(), 1);
    assert_eq!(retrieved[0].chunk.source_name(), "third.pdf");
    // Uploads never touch the preloaded index.
    assert!(!EmbeddingStorage::new(&context.config().vectorstore_path).exists());
}

#[tokio::test]
async fn failed_upload_leaves_no_corpus_loaded() {
    let root = tempfile::tempdir().unwrap();
    let context = ingested_context(root.path(), &[("sky.pdf", "The sky is blue.")])
        .await
        .unwrap();
    let mut shell = Shell::new(&context, AnswerBackend::Offline);
    shell.load_preloaded().unwrap();

    let missing = papers_dir(root.path()).join("missing.pdf");
    assert!(shell.rebuild_from_uploads(&[missing]).await.is_err());
    assert!(matches!(shell.state(), ShellState::NoIndex));
}
