//! Replay strings (`curl ...` command lines) to request descriptors.
//!
//! ```
//! use pagediff_web::translator::{Method, translate};
//!
//! let req = translate(r#"curl "https://a.test" -H "X: y" -X POST -d "body""#, "ua/1.0").unwrap();
//! assert_eq!(req.method, Method::Post);
//! assert_eq!(req.url, "https://a.test");
//! assert_eq!(req.header("x"), Some("y"));
//! assert_eq!(req.body.as_deref(), Some("body"));
//! ```

use pagediff_http::render_curl;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use thiserror::Error;
use url::Url;

pub const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

const COMPRESSED_ENCODINGS: &str = "gzip, deflate";

/// Options that take an argument this translator has no use for. Their
/// argument is skipped so it is never mistaken for the URL.
const IGNORED_WITH_ARGUMENT: &[&str] = &[
    "--output",
    "--max-time",
    "--connect-timeout",
    "--proxy",
    "--user",
    "--retry",
    "--write-out",
    "--cacert",
    "--cert",
    "--resolve",
];
const IGNORED_SHORT_WITH_ARGUMENT: &[char] = &['o', 'm', 'x', 'u', 'w', 'E'];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("no URL found in replay string")]
    MissingUrl,
    #[error("option {0} expects an argument")]
    MissingArgument(String),
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),
    #[error("header line without ':' separator: {0:?}")]
    MalformedHeader(String),
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("expected a curl command or a bare URL")]
    NotReplay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Other(String),
}

impl Method {
    /// Case-insensitive; anything unrecognised is kept upper-cased.
    pub fn parse(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            _ => Method::Other(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Other(m) => m,
        }
    }

    /// The wire method. Fails for names that are not valid HTTP tokens.
    pub fn to_http(&self) -> Result<pagediff_http::Method, String> {
        pagediff_http::Method::from_bytes(self.as_str().as_bytes())
            .map_err(|e| format!("invalid HTTP method {:?}: {e}", self.as_str()))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for String {
    fn from(m: Method) -> Self {
        m.as_str().to_string()
    }
}

/// A fully specified HTTP request. `url` is always absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    /// Keyed by canonical `Title-Case` name.
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl RequestDescriptor {
    /// GET `url` with the header set a desktop browser would send.
    pub fn browser_like(url: &str, user_agent: &str) -> Result<Self, TranslateError> {
        let url = validate_url(url)?;
        let mut headers = BTreeMap::new();
        for (name, value) in [
            ("User-Agent", user_agent),
            ("Accept", BROWSER_ACCEPT),
            ("Accept-Language", "en-US,en;q=0.5"),
            ("Accept-Encoding", COMPRESSED_ENCODINGS),
            ("Connection", "keep-alive"),
            ("Upgrade-Insecure-Requests", "1"),
        ] {
            headers.insert(name.to_string(), value.to_string());
        }
        Ok(Self {
            method: Method::Get,
            url,
            headers,
            body: None,
        })
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&canonical_header_name(name)).map(String::as_str)
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers
            .insert(canonical_header_name(name), value.trim().to_string());
    }

    /// Render as a replay string that [`translate`] maps back to `self`.
    pub fn to_curl(&self) -> String {
        let headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        render_curl(self.method.as_str(), &self.url, &headers, self.body.as_deref())
    }
}

/// `content-type` -> `Content-Type`, `X` -> `X`.
pub fn canonical_header_name(name: &str) -> String {
    name.trim()
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Whether `input` is a replay string rather than a bare URL.
pub fn is_replay(input: &str) -> bool {
    let trimmed = input.trim_start();
    trimmed
        .get(..4)
        .is_some_and(|head| head.eq_ignore_ascii_case("curl"))
        && trimmed[4..].chars().next().is_none_or(char::is_whitespace)
}

/// Translate a replay string, or wrap a bare URL with browser-like headers.
pub fn translate(input: &str, user_agent: &str) -> Result<RequestDescriptor, TranslateError> {
    let mut tokens = tokenize(input)?;

    if !is_replay(input) {
        return match tokens.as_slice() {
            [url] => RequestDescriptor::browser_like(url, user_agent),
            [] => Err(TranslateError::MissingUrl),
            _ => Err(TranslateError::NotReplay),
        };
    }
    tokens.remove(0);

    let mut req = RequestDescriptor {
        method: Method::Get,
        url: String::new(),
        headers: BTreeMap::new(),
        body: None,
    };
    let mut url: Option<String> = None;
    let mut args = tokens.into_iter();

    while let Some(token) = args.next() {
        if let Some(long) = token.strip_prefix("--") {
            match long {
                "compressed" => req.set_header("Accept-Encoding", COMPRESSED_ENCODINGS),
                "data" | "data-raw" | "data-binary" | "data-ascii" => {
                    req.body = Some(next_arg(&mut args, &token)?);
                    req.method = Method::Post;
                }
                "header" => add_header(&mut req, &next_arg(&mut args, &token)?)?,
                "request" => req.method = Method::parse(&next_arg(&mut args, &token)?),
                "url" => url = Some(next_arg(&mut args, &token)?),
                "user-agent" => req.set_header("User-Agent", &next_arg(&mut args, &token)?),
                "cookie" => req.set_header("Cookie", &next_arg(&mut args, &token)?),
                "referer" => req.set_header("Referer", &next_arg(&mut args, &token)?),
                _ if IGNORED_WITH_ARGUMENT.contains(&token.as_str()) => {
                    next_arg(&mut args, &token)?;
                }
                _ => tracing::debug!(target: "translate", option = %token, "ignoring curl option"),
            }
        } else if token.len() > 1 && token.starts_with('-') {
            for flag in token[1..].chars() {
                let option = format!("-{flag}");
                match flag {
                    'H' => add_header(&mut req, &next_arg(&mut args, &option)?)?,
                    'X' => req.method = Method::parse(&next_arg(&mut args, &option)?),
                    'd' => {
                        req.body = Some(next_arg(&mut args, &option)?);
                        req.method = Method::Post;
                    }
                    'A' => req.set_header("User-Agent", &next_arg(&mut args, &option)?),
                    'b' => req.set_header("Cookie", &next_arg(&mut args, &option)?),
                    'e' => req.set_header("Referer", &next_arg(&mut args, &option)?),
                    f if IGNORED_SHORT_WITH_ARGUMENT.contains(&f) => {
                        next_arg(&mut args, &option)?;
                    }
                    _ => tracing::debug!(target: "translate", %option, "ignoring curl flag"),
                }
            }
        } else {
            url = Some(token.trim_matches(['\'', '"']).to_string());
        }
    }

    req.url = match url {
        Some(u) if !u.trim().is_empty() => validate_url(&u)?,
        _ => return Err(TranslateError::MissingUrl),
    };
    Ok(req)
}

fn next_arg(
    args: &mut impl Iterator<Item = String>,
    option: &str,
) -> Result<String, TranslateError> {
    args.next()
        .ok_or_else(|| TranslateError::MissingArgument(option.to_string()))
}

fn add_header(req: &mut RequestDescriptor, line: &str) -> Result<(), TranslateError> {
    let (name, value) = line
        .split_once(':')
        .filter(|(name, _)| !name.trim().is_empty())
        .ok_or_else(|| TranslateError::MalformedHeader(line.to_string()))?;
    req.set_header(name, value);
    Ok(())
}

fn validate_url(raw: &str) -> Result<String, TranslateError> {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(raw.to_string()),
        Ok(parsed) => Err(TranslateError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {:?}", parsed.scheme()),
        }),
        Err(e) => Err(TranslateError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Shell-style word splitting.
///
/// Single quotes are literal. Inside double quotes only `\"` and `\\` are
/// escapes; other backslashes stay. `$'...'` understands `\n`, `\t`, `\r`,
/// `\\`, `\'` and `\"`. Outside quotes a backslash escapes the next
/// character and a backslash-newline is a line continuation.
pub fn tokenize(input: &str) -> Result<Vec<String>, TranslateError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(TranslateError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.peek() {
                            Some(&(escaped @ ('"' | '\\'))) => {
                                current.push(escaped);
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(TranslateError::UnterminatedQuote('"')),
                    }
                }
            }
            '$' if chars.peek() == Some(&'\'') => {
                chars.next();
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => current.push('\n'),
                            Some('t') => current.push('\t'),
                            Some('r') => current.push('\r'),
                            Some(ch @ ('\\' | '\'' | '"')) => current.push(ch),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(TranslateError::UnterminatedQuote('\'')),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(TranslateError::UnterminatedQuote('\'')),
                    }
                }
            }
            '\\' => match chars.next() {
                Some('\n') => {}
                Some('\r') if chars.peek() == Some(&'\n') => {
                    chars.next();
                }
                Some(ch) => {
                    in_token = true;
                    current.push(ch);
                }
                None => {
                    in_token = true;
                    current.push('\\');
                }
            },
            ch => {
                in_token = true;
                current.push(ch);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
