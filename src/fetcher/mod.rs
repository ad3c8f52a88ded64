//! Fetcher — acquires audio bytes from a URL.

use crate::error::FetchError;
use crate::job_log::JobLog;
use reqwest::Client;
use std::time::Duration;

const MAX_REDIRECTS: u32 = 5;
const READ_TIMEOUT: Duration = Duration::from_secs(120);
const MIN_PAYLOAD_BYTES: usize = 1024;
const PROGRESS_STEP_BYTES: u64 = 5 * 1024 * 1024;
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36";

/// Download `url`, following up to `MAX_REDIRECTS` redirects manually so we
/// can bound hop count ourselves rather than trusting `reqwest`'s default
/// redirect policy.
pub async fn fetch(client: &Client, url: &str, job_id: &str, log: &JobLog) -> Result<Vec<u8>, FetchError> {
    let mut current_url = url.to_string();

    for hop in 0..=MAX_REDIRECTS {
        let response = client
            .get(&current_url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "audio/*, */*")
            .timeout(READ_TIMEOUT)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status.is_redirection() {
            if hop == MAX_REDIRECTS {
                return Err(FetchError::TooManyRedirects);
            }
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| FetchError::HttpError { status: status.as_u16() })?;
            current_url = resolve_redirect(&current_url, location);
            continue;
        }

        if !status.is_success() {
            return Err(FetchError::HttpError {
                status: status.as_u16(),
            });
        }

        return stream_body(response, job_id, log).await;
    }

    Err(FetchError::TooManyRedirects)
}

/// Resolve a `Location` header that may be relative against the URL it came
/// from.
fn resolve_redirect(base: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        return location.to_string();
    }
    match reqwest::Url::parse(base).and_then(|b| b.join(location)) {
        Ok(joined) => joined.to_string(),
        Err(_) => location.to_string(),
    }
}

async fn stream_body(
    response: reqwest::Response,
    job_id: &str,
    log: &JobLog,
) -> Result<Vec<u8>, FetchError> {
    use futures_util::StreamExt;

    let mut buf = Vec::new();
    let mut downloaded: u64 = 0;
    let mut last_progress_mark: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::NetworkError(e.to_string()))?;
        downloaded += chunk.len() as u64;
        buf.extend_from_slice(&chunk);

        if downloaded - last_progress_mark >= PROGRESS_STEP_BYTES {
            last_progress_mark = downloaded;
            log.info(
                job_id,
                "fetch",
                format!("downloaded {} MiB", downloaded / (1024 * 1024)),
            )
            .await;
        }
    }

    if buf.len() < MIN_PAYLOAD_BYTES {
        return Err(FetchError::InvalidPayload { bytes: buf.len() });
    }

    Ok(buf)
}
