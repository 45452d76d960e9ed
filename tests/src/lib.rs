//! Fixtures shared by the end-to-end scenarios.

use application::context::AppContext;
use infrastructure::config::{Config, EmbedderKind};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Write a one-page PDF showing `text` in Helvetica.
pub fn write_single_page_pdf(path: &Path, text: &str) -> anyhow::Result<()> {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)");
    let content = format!("BT /F1 24 Tf 72 720 Td ({escaped}) Tj ET");
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    let mut pdf = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
    }
    let xref_offset = pdf.len();
    pdf.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    pdf.push_str("0000000000 65535 f \n");
    for offset in offsets {
        pdf.push_str(&format!("{offset:010} 00000 n \n"));
    }
    pdf.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    ));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, pdf)?;
    Ok(())
}

/// Offline-capable configuration rooted in `root`: hashing embedder, no API key.
pub fn test_config(root: &Path) -> Config {
    Config {
        gemini_api_key: None,
        llm_timeout: Duration::from_secs(5),
        embedder: EmbedderKind::Hashing,
        hashing_dimensions: 256,
        vectorstore_path: root.join("vectorstore"),
        papers_dir: root.join("papers"),
        upload_dir: root.join("uploaded_pdfs"),
        ..Config::default()
    }
}

pub fn papers_dir(root: &Path) -> PathBuf {
    root.join("papers")
}

/// Ingest `papers` (file name, text) into the preloaded index and return a
/// context over it.
pub async fn ingested_context(root: &Path, papers: &[(&str, &str)]) -> anyhow::Result<AppContext> {
    let dir = papers_dir(root);
    fs::create_dir_all(&dir)?;
    for (name, text) in papers {
        write_single_page_pdf(&dir.join(name), text)?;
    }
    let context = AppContext::initialize(test_config(root))?;
    context.ingest_preloaded().await?;
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_writes_a_well_formed_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.pdf");
        write_single_page_pdf(&path, "Attention (is) all you need.").unwrap();
        let bytes = fs::read_to_string(&path).unwrap();
        assert!(bytes.starts_with("%PDF-1.4"));
        assert!(bytes.contains("(Attention \\(is\\) all you need.) Tj"));

        let xref_at: usize = bytes
            .lines()
            .skip_while(|l| *l != "startxref")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert!(bytes[xref_at..].starts_with("xref\n0 6\n"));
        let first_object: usize = bytes[xref_at..].lines().nth(3).unwrap()[..10].parse().unwrap();
        assert!(bytes[first_object..].starts_with("1 0 obj"));
    }
}
