//! Decide from a page's initial HTML whether its content is produced
//! client-side (a PWA or a React application).
//!
//! The probe is fail-open: any transport or header problem yields
//! [`Classification::Failed`], which [`Classification::is_dynamic`] reports
//! as `false` so the caller falls back to the cheaper static route.

use pagediff_common::PageDiffError;
use pagediff_http::{HttpClient, Method, RequestOpts};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{Html, Selector};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// `<link rel="manifest">`
    Manifest,
    /// `serviceWorker` appears in the body.
    ServiceWorker,
    /// `<meta name="apple-mobile-web-app-capable">`
    AppCapableMeta,
    /// `<meta name="application-name">`
    ApplicationNameMeta,
    /// An element carrying `data-reactroot`.
    ReactRootAttribute,
    /// An element carrying `data-reactid`.
    ReactIdAttribute,
    /// `react` appears anywhere in the body, any case.
    ReactName,
    /// `_reactRootContainer` appears in the body.
    ReactRootContainer,
    /// `__REACT_DEVTOOLS_GLOBAL_HOOK__` appears in the body.
    ReactDevtoolsHook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorFamily {
    Pwa,
    React,
}

impl Indicator {
    pub fn family(self) -> IndicatorFamily {
        match self {
            Indicator::Manifest
            | Indicator::ServiceWorker
            | Indicator::AppCapableMeta
            | Indicator::ApplicationNameMeta => IndicatorFamily::Pwa,
            _ => IndicatorFamily::React,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Classification {
    Classified {
        is_dynamic: bool,
        indicators: Vec<Indicator>,
    },
    Failed {
        reason: String,
    },
}

impl Classification {
    fn from_indicators(indicators: Vec<Indicator>) -> Self {
        Classification::Classified {
            is_dynamic: !indicators.is_empty(),
            indicators,
        }
    }

    /// Failed probes count as static.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Classification::Classified { is_dynamic: true, .. })
    }

    pub fn indicators(&self) -> &[Indicator] {
        match self {
            Classification::Classified { indicators, .. } => indicators,
            Classification::Failed { .. } => &[],
        }
    }
}

const SELECTOR_INDICATORS: &[(&str, Indicator)] = &[
    (r#"link[rel~="manifest" i]"#, Indicator::Manifest),
    (r#"meta[name="apple-mobile-web-app-capable" i]"#, Indicator::AppCapableMeta),
    (r#"meta[name="application-name" i]"#, Indicator::ApplicationNameMeta),
    ("[data-reactroot]", Indicator::ReactRootAttribute),
    ("[data-reactid]", Indicator::ReactIdAttribute),
];

/// Every indicator present in `body`, in declaration order. Any one is
/// enough to call the page dynamic.
pub fn detect_indicators(body: &str) -> Vec<Indicator> {
    let document = Html::parse_document(body);
    let mut found = Vec::new();

    for (css, indicator) in SELECTOR_INDICATORS {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if document.select(&selector).next().is_some() {
            found.push(*indicator);
        }
    }

    if body.contains("serviceWorker") {
        found.push(Indicator::ServiceWorker);
    }
    if body.to_lowercase().contains("react") {
        found.push(Indicator::ReactName);
    }
    if body.contains("_reactRootContainer") {
        found.push(Indicator::ReactRootContainer);
    }
    if body.contains("__REACT_DEVTOOLS_GLOBAL_HOOK__") {
        found.push(Indicator::ReactDevtoolsHook);
    }

    found.sort_by_key(|i| *i as u8);
    found
}

pub struct SiteClassifier {
    http: HttpClient,
    user_agent: String,
}

impl SiteClassifier {
    pub fn new(http: HttpClient, user_agent: impl Into<String>) -> Self {
        Self {
            http,
            user_agent: user_agent.into(),
        }
    }

    /// One GET with the configured user agent, then [`detect_indicators`]
    /// on the body whatever the status.
    pub async fn classify(&self, url: &str) -> Classification {
        let outcome = match self.probe(url).await {
            Ok(body) => Classification::from_indicators(detect_indicators(&body)),
            Err(e) => Classification::Failed {
                reason: e.to_string(),
            },
        };

        match &outcome {
            Classification::Classified {
                is_dynamic,
                indicators,
            } => tracing::info!(
                target: "classify",
                %url,
                is_dynamic,
                indicators = ?indicators,
                "site classified"
            ),
            Classification::Failed { reason } => tracing::warn!(
                target: "classify",
                %url,
                %reason,
                "classification failed; treating as static"
            ),
        }
        outcome
    }

    async fn probe(&self, url: &str) -> Result<String, PageDiffError> {
        let ua = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| PageDiffError::Classification(format!("invalid user agent: {e}")))?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, ua);

        let opts = RequestOpts {
            headers: Some(headers),
            retries: Some(0),
        };
        self.http
            .send_text(Method::GET, url, None, opts)
            .await
            .map(|resp| resp.body)
            .map_err(|e| PageDiffError::Classification(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_document_has_no_indicators() {
        let html = "<html><head><title>Docs</title></head><body><p>Static text.</p></body></html>";
        assert!(detect_indicators(html).is_empty());
    }

    #[test]
    fn pwa_markers_are_detected() {
        let html = r#"<html><head>
            <link rel="manifest" href="/app.webmanifest">
            <meta name="apple-mobile-web-app-capable" content="yes">
            <meta name="application-name" content="Notes">
            </head><body><script>navigator.serviceWorker.register('/sw.js')</script></body></html>"#;
        let found = detect_indicators(html);
        assert_eq!(
            found,
            vec![
                Indicator::Manifest,
                Indicator::ServiceWorker,
                Indicator::AppCapableMeta,
                Indicator::ApplicationNameMeta,
            ]
        );
        assert!(found.iter().all(|i| i.family() == IndicatorFamily::Pwa));
    }

    #[test]
    fn manifest_matches_within_rel_list() {
        let html = r#"<link rel="preload manifest" href="/m.json">"#;
        assert_eq!(detect_indicators(html), vec![Indicator::Manifest]);
    }

    #[test]
    fn react_markers_are_detected() {
        let html = r#"<div id="root" data-reactroot=""><span data-reactid=".0">x</span></div>
            <script>window.__REACT_DEVTOOLS_GLOBAL_HOOK__; el._reactRootContainer</script>"#;
        let found = detect_indicators(html);
        for expected in [
            Indicator::ReactRootAttribute,
            Indicator::ReactIdAttribute,
            Indicator::ReactName,
            Indicator::ReactRootContainer,
            Indicator::ReactDevtoolsHook,
        ] {
            assert!(found.contains(&expected), "missing {expected:?}");
        }
    }

    #[test]
    fn framework_name_is_case_insensitive() {
        assert_eq!(
            detect_indicators("<p>Built with REACT</p>"),
            vec![Indicator::ReactName]
        );
    }

    #[test]
    fn failed_probe_is_not_dynamic() {
        let failed = Classification::Failed {
            reason: "connection refused".into(),
        };
        assert!(!failed.is_dynamic());
        assert!(failed.indicators().is_empty());
    }

    #[test]
    fn serializes_as_tagged_outcome() {
        let c = Classification::from_indicators(vec![Indicator::ServiceWorker]);
        assert_eq!(
            serde_json::to_value(&c).unwrap(),
            serde_json::json!({
                "outcome": "classified",
                "is_dynamic": true,
                "indicators": ["service_worker"]
            })
        );
    }
}
