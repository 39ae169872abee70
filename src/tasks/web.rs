use anyhow::anyhow;
use tokio::process::Command;
use tracing::info;
use url::Url;

use crate::shared::AppState;
use crate::tasks::{write_output, Result, TaskError, TaskRequest};

const DATAGEN_URL: &str = "https://raw.githubusercontent.com/sanand0/tools-in-data-science-public/tds-2025-01/project-1/datagen.py";
const DATAGEN_SCRIPT: &str = "datagen.py";
const FETCH_OUTPUT: &str = "/data/fetched.txt";
const SCRAPE_OUTPUT: &str = "/data/scraped.json";

fn require_url(req: &TaskRequest<'_>) -> Result<Url> {
    let raw = req
        .url()
        .ok_or_else(|| TaskError::MissingInput("a URL in the task".to_string()))?;
    Url::parse(&raw).map_err(|e| TaskError::Rejected(format!("invalid URL {raw}: {e}")))
}

/// Download the data-generation script and run it with the caller's email,
/// seeding the data root with the generated files.
pub async fn generate_data(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let email = req
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| TaskError::MissingInput("an email argument".to_string()))?;

    let url = req.url().unwrap_or_else(|| DATAGEN_URL.to_string());
    let script = state.sandbox.resolve(DATAGEN_SCRIPT)?;

    info!(%url, "downloading data generation script");
    let body = fetch_bytes(state, &url).await?;
    write_output(&script, body).await?;

    let out = Command::new("uv")
        .arg("run")
        .arg(&script)
        .arg(email)
        .current_dir(state.sandbox.root())
        .output()
        .await
        .map_err(|e| anyhow!("failed to launch uv: {}", e))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(TaskError::External(anyhow!(
            "data generation exited with {}: {}",
            out.status,
            stderr.trim()
        )));
    }

    Ok(format!("Generated data under {}", state.sandbox.root().display()))
}

async fn fetch_bytes(state: &AppState, url: &str) -> Result<Vec<u8>> {
    let response = state
        .http
        .get(url)
        .send()
        .await
        .map_err(|e| anyhow!("request to {} failed: {}", url, e))?;

    if !response.status().is_success() {
        return Err(TaskError::External(anyhow!(
            "{} answered {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| anyhow!("failed to read body from {}: {}", url, e))?;
    Ok(bytes.to_vec())
}

/// Fetch a URL and save the raw body under the data root.
pub async fn fetch_url(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let url = require_url(req)?;
    let output = state.sandbox.resolve(&req.path_or(0, FETCH_OUTPUT))?;

    let body = fetch_bytes(state, url.as_str()).await?;
    let size = body.len();
    write_output(&output, body).await?;

    Ok(format!("Saved {} bytes from {} to {}", size, url, output.display()))
}

/// Fetch a page, parse out every `<a href>`, and write the link list as JSON.
pub async fn scrape_links(state: &AppState, req: &TaskRequest<'_>) -> Result<String> {
    let url = require_url(req)?;
    let output = state.sandbox.resolve(&req.path_or(0, SCRAPE_OUTPUT))?;

    let body = fetch_bytes(state, url.as_str()).await?;
    let page = String::from_utf8_lossy(&body).into_owned();

    // Html is not Send; keep it out of scope before the next await
    let links = collect_links(&page);

    let count = links.len();
    let json = serde_json::json!({ "url": url.as_str(), "links": links });
    write_output(&output, serde_json::to_string(&json).map_err(|e| anyhow!(e))?).await?;

    Ok(format!("Scraped {} links from {} into {}", count, url, output.display()))
}

fn collect_links(page: &str) -> Vec<String> {
    let document = scraper::Html::parse_document(page);
    let selector = scraper::Selector::parse("a[href]").expect("valid selector");
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_hrefs_in_document_order() {
        let page = r#"<html><body>
            <a href="/first">one</a>
            <p>noise</p>
            <a href="https://example.com/second">two</a>
            <a>no href</a>
        </body></html>"#;
        assert_eq!(
            collect_links(page),
            vec!["/first", "https://example.com/second"]
        );
    }

    #[test]
    fn tasks_without_a_url_are_missing_input() {
        let req = TaskRequest {
            task: "fetch something",
            email: None,
            paths: vec![],
        };
        assert!(matches!(
            require_url(&req),
            Err(TaskError::MissingInput(_))
        ));
    }
}
