use crate::translator::RequestDescriptor;
use pagediff_common::{ExtractedContent, PageDiffError, collapse_whitespace};
use pagediff_http::{HttpClient, RequestOpts};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use scraper::Html;

/// Subtrees dropped entirely, text included.
const STRIPPED_TAGS: [&str; 2] = ["script", "style"];

/// Visible text of an HTML document: text nodes outside `<script>` and
/// `<style>`, trimmed, joined by single spaces, whitespace-collapsed.
///
/// The walk keeps its own stack, so arbitrarily deep markup cannot exhaust
/// the thread stack.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts = Vec::new();
    let mut pending = vec![*document.root_element()];

    while let Some(node) = pending.pop() {
        if let Some(text) = node.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
            continue;
        }
        let stripped = node
            .value()
            .as_element()
            .is_some_and(|el| STRIPPED_TAGS.contains(&el.name()));
        if !stripped {
            pending.extend(node.children().rev());
        }
    }
    collapse_whitespace(&parts.join(" "))
}

/// Plain HTTP retrieval. Holds a pooled client; nothing request-specific
/// survives between calls.
pub struct StaticExtractor {
    http: HttpClient,
}

impl StaticExtractor {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Issue `req` once. `None` on transport failure or a status outside
    /// 2xx/3xx.
    pub async fn fetch(&self, req: &RequestDescriptor) -> Option<ExtractedContent> {
        match self.try_fetch(req).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::error!(target: "extract.static", url = %req.url, error = %e, "static fetch failed");
                None
            }
        }
    }

    async fn try_fetch(&self, req: &RequestDescriptor) -> Result<ExtractedContent, PageDiffError> {
        let method = req
            .method
            .to_http()
            .map_err(|reason| PageDiffError::Translation(format!("unusable method: {reason}")))?;
        let headers = header_map(req)
            .map_err(|reason| PageDiffError::Translation(format!("unusable header: {reason}")))?;

        let opts = RequestOpts {
            headers: Some(headers),
            retries: Some(0),
        };
        let response = self
            .http
            .send_text(method, &req.url, req.body.clone(), opts)
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| PageDiffError::Network(e.to_string()))?;

        let content = ExtractedContent::new(&html_to_text(&response.body), req.url.clone());
        tracing::info!(
            target: "extract.static",
            url = %req.url,
            status = response.status.as_u16(),
            chars = content.text.len(),
            "static content extracted"
        );
        Ok(content)
    }
}

fn header_map(req: &RequestDescriptor) -> Result<HeaderMap, String> {
    let mut map = HeaderMap::with_capacity(req.headers.len());
    for (name, value) in &req.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| format!("{name}: {e}"))?;
        let value = HeaderValue::from_str(value).map_err(|e| format!("{name}: {e}"))?;
        map.insert(name, value);
    }
    Ok(map)
}
