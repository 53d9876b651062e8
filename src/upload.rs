use crate::constants::{MAX_PDF_BYTES, PDF_MIME, UPLOAD_PATH};
use crate::main_helper::AppContext;
use crate::types::{failure_detail, RaglineError, Result, UploadReceipt};
use std::path::Path;

/// Uploads a PDF for indexing. Type and size are checked locally before
/// any bytes go over the wire, mirroring what the web client enforces.
pub async fn upload_pdf(ctx: &AppContext, path: &Path) -> Result<UploadReceipt> {
    let is_pdf = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(RaglineError::Upload("only PDF files are accepted".to_string()).into());
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_PDF_BYTES {
        return Err(RaglineError::Upload(format!(
            "file is {} bytes; the limit is {} (50 MiB)",
            metadata.len(),
            MAX_PDF_BYTES
        ))
        .into());
    }

    let token = match ctx.bearer_token() {
        Some(t) => t,
        None => return Err(RaglineError::Auth("sign in before uploading".to_string()).into()),
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "uploaded.pdf".to_string());
    let bytes = tokio::fs::read(path).await?;
    tracing::info!("uploading {} ({} bytes)", file_name, bytes.len());

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(PDF_MIME)?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = ctx
        .client
        .post(ctx.endpoint(UPLOAD_PATH))
        .timeout(ctx.request_timeout())
        .header("Authorization", format!("Bearer {}", token))
        .multipart(form)
        .send()
        .await
        .map_err(RaglineError::Network)?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(RaglineError::Upload(failure_detail(&body, "Upload failed")).into());
    }

    let receipt: UploadReceipt = serde_json::from_str(&body)?;
    tracing::info!(
        "indexed {}: {:?} pages, {:?} chunks",
        receipt.filename,
        receipt.pages,
        receipt.chunks
    );
    Ok(receipt)
}
