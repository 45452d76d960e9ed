use anyhow::{anyhow, Context};
use domain::models::Document;
use memmap2::Mmap;
use rayon::prelude::*;
use shared::types::Result;
use shared::utils::is_supported_file;
use std::collections::HashSet;
use std::fs::File;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Finds PDFs under a directory and extracts their text page by page.
pub struct FileScanner {
    root_path: PathBuf,
    ignored_dirs: HashSet<String>,
    max_file_bytes: u64,
}

/// Pages extracted from one scan, plus bookkeeping for the ingest report.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub documents: Vec<Document>,
    pub files_seen: usize,
    pub files_skipped: usize,
}

impl FileScanner {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            ignored_dirs: [".git", "node_modules", "target", ".cache", "__pycache__", "venv"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_file_bytes: 256 * 1024 * 1024,
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Collect and extract every PDF under the root.
    ///
    /// Files that cannot be read or parsed are logged and counted as skipped.
    pub fn scan_documents(&self) -> Result<ScanOutcome> {
        let files = self.collect_files()?;
        Ok(self.scan_paths(&files))
    }

    pub fn scan_paths(&self, paths: &[PathBuf]) -> ScanOutcome {
        tracing::info!(files = paths.len(), root = %self.root_path.display(), "extracting PDF text");
        let results: Vec<(PathBuf, Result<Vec<Document>>)> = paths
            .par_iter()
            .map(|path| (path.clone(), self.load_pages(path)))
            .collect();

        let mut outcome = ScanOutcome {
            files_seen: paths.len(),
            ..ScanOutcome::default()
        };
        for (path, result) in results {
            match result {
                Ok(pages) => {
                    tracing::debug!(path = %path.display(), pages = pages.len(), "extracted");
                    outcome.documents.extend(pages);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "skipping unreadable PDF");
                    outcome.files_skipped += 1;
                }
            }
        }
        outcome
    }

    /// All PDF paths under the root, sorted so builds are reproducible.
    pub fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        self.collect_files_recursive(&self.root_path, &mut files)
            .with_context(|| format!("failed to scan {}", self.root_path.display()))?;
        files.sort();
        Ok(files)
    }

    fn collect_files_recursive(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if self.ignored_dirs.contains(name) {
                        continue;
                    }
                }
                self.collect_files_recursive(&path, files)?;
            } else if is_supported_file(&path) {
                files.push(path);
            }
        }
        Ok(())
    }

    /// One [`Document`] per non-blank page, pages numbered from 1.
    fn load_pages(&self, path: &Path) -> Result<Vec<Document>> {
        let len = path.metadata()?.len();
        if len > self.max_file_bytes {
            return Err(anyhow!("file is {len} bytes, limit is {}", self.max_file_bytes));
        }
        if len == 0 {
            return Err(anyhow!("file is empty"));
        }
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and dropped before this function returns.
        let mmap = unsafe { Mmap::map(&file)? };

        // The extractor panics on some malformed files; treat that like any parse error.
        let pages = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(&mmap)
        }))
        .map_err(|_| anyhow!("PDF extractor panicked"))?
        .map_err(|e| anyhow!("PDF extraction failed: {e}"))?;

        Ok(pages
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| Document::new(path, Some(i as u32 + 1), text))
            .collect())
    }
}
