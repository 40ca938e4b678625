use anyhow::{Context, Result, bail};
use nexus_service::{
    models::{DOCX_MIME, PDF_MIME, UploadFile},
    reader::DocumentReader,
};
use std::{env, path::Path};

const PREVIEW_CHARS: usize = 500;

fn guess_mime_type(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => PDF_MIME,
        "docx" => DOCX_MIME,
        "txt" => "text/plain",
        "md" => "text/markdown",
        _ => return None,
    };
    Some(mime.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        bail!("Usage: {} <document_path>", args[0]);
    }

    let path = Path::new(&args[1]);
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args[1].clone());
    let file = UploadFile::new(name, guess_mime_type(path), content);

    println!("Document: {} ({})", path.display(), file.format());
    if !file.is_accepted() {
        bail!("Unsupported format. Accepted formats: PDF, DOCX, TXT, MD.");
    }

    let text = DocumentReader::default().read(&file).await?;
    let text = text.as_str();
    println!("Extracted {} characters", text.chars().count());
    println!();

    println!("Extracted Text (first {PREVIEW_CHARS} chars):");
    println!("────────────────────────────────────");
    if text.chars().count() > PREVIEW_CHARS {
        let truncated: String = text.chars().take(PREVIEW_CHARS).collect();
        println!("{truncated}...");
    } else {
        println!("{text}");
    }

    Ok(())
}
