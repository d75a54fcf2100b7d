//! Keyword substitution.
//!
//! When the keyword appears somewhere in the request template, the template
//! is serialized to an HTTP/1.1 request, the keyword is replaced in that text
//! and the text is parsed back. URL, extension and body are substituted on
//! their own on top of the parsed request. Without a keyword the entry is
//! appended to the base URL as a path segment.

use std::str::FromStr;

use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;
use tracing::trace;

use super::DispatchError;
use crate::utils;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("keyword must not be empty")]
    EmptyKeyword,

    #[error("invalid base URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("{0}")]
    InvalidMethod(String),

    #[error("{0}")]
    InvalidHeader(String),
}

#[derive(Clone, Debug)]
pub struct RequestTemplate {
    keyword: String,
    title_keyword: String,
    keyword_present: bool,
    method: String,
    base_url: String,
    headers: Vec<(String, String)>,
    body: String,
    raw: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedRequest {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ParsedRequest {
    pub(crate) method: String,
    pub(crate) target: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: String,
}

impl RequestTemplate {
    /// `headers` is the full ordered header list; later entries win over
    /// earlier ones with the same name.
    pub fn new(
        keyword: &str,
        method: &str,
        base_url: &str,
        headers: Vec<(String, String)>,
        body: &str,
        extensions: &[String],
    ) -> Result<Self, TemplateError> {
        if keyword.is_empty() {
            return Err(TemplateError::EmptyKeyword);
        }
        let url = reqwest::Url::parse(base_url).map_err(|e| TemplateError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        let method = method.trim().to_ascii_uppercase();
        let title_keyword = utils::title_case(keyword);
        // either spelling marks a position
        let has = |text: &str| text.contains(keyword) || text.contains(title_keyword.as_str());

        let keyword_present = has(url.path())
            || url.query().map(has).unwrap_or(false)
            || headers.iter().any(|(k, v)| has(k) || has(v))
            || has(body)
            || has(&method)
            || extensions.iter().any(|e| has(e));

        if !has(&method) {
            utils::parse_http_method(&method).map_err(TemplateError::InvalidMethod)?;
        }
        for (name, value) in headers.iter() {
            if !has(name) {
                HeaderName::from_str(name).map_err(|_| {
                    TemplateError::InvalidHeader(format!("invalid header name '{name}'"))
                })?;
            }
            if !has(value) {
                HeaderValue::from_str(value).map_err(|_| {
                    TemplateError::InvalidHeader(format!("invalid value for header '{name}'"))
                })?;
            }
        }

        let raw = serialize_request(&method, &url, &headers, body);
        Ok(Self {
            title_keyword,
            keyword: keyword.to_string(),
            keyword_present,
            method,
            base_url: base_url.to_string(),
            headers,
            body: body.to_string(),
            raw,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn keyword_present(&self) -> bool {
        self.keyword_present
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replaces the exact-case keyword, then its title-case form.
    pub fn substitute(&self, text: &str, entry: &str) -> String {
        let out = text.replace(&self.keyword, entry);
        if self.title_keyword == self.keyword {
            return out;
        }
        out.replace(&self.title_keyword, entry)
    }

    pub fn resolve(&self, entry: &str, extension: &str) -> Result<ResolvedRequest, DispatchError> {
        if !self.keyword_present {
            let entry = entry.strip_prefix('/').unwrap_or(entry);
            let method = utils::parse_http_method(&self.method).map_err(DispatchError::InvalidRequest)?;
            return Ok(ResolvedRequest {
                method,
                url: format!("{}/{}{}", self.base_url, entry, extension),
                headers: self.headers.clone(),
                body: self.body.clone(),
                label: entry.to_string(),
            });
        }

        let replaced = self.substitute(&self.raw, entry);
        let parsed = parse_raw_request(&replaced).map_err(DispatchError::Substitution)?;

        // the extension and the URL never pass through the serialized form
        // as-is, so they get their own pass. an entry that itself contains
        // the keyword is substituted twice in the extension part.
        let extension = self.substitute(extension, entry);
        let url = self.substitute(&format!("{}{}", self.base_url, extension), entry);
        let body = if self.body.is_empty() {
            parsed.body
        } else {
            self.substitute(&self.body, entry)
        };
        trace!("resolved {} {} for '{}'", parsed.method, parsed.target, entry);

        let method = utils::parse_http_method(&parsed.method).map_err(DispatchError::InvalidRequest)?;
        let headers = parsed
            .headers
            .into_iter()
            .filter(|(k, _)| {
                !k.eq_ignore_ascii_case("host") && !k.eq_ignore_ascii_case("content-length")
            })
            .collect();

        Ok(ResolvedRequest {
            method,
            url,
            headers,
            body,
            label: entry.to_string(),
        })
    }
}

impl ResolvedRequest {
    pub fn build(&self, client: &reqwest::Client) -> Result<reqwest::Request, DispatchError> {
        let mut req = client
            .request(self.method.clone(), self.url.as_str())
            .build()
            .map_err(|e| DispatchError::InvalidRequest(e.to_string()))?;
        for (k, v) in self.headers.iter() {
            let key = HeaderName::from_str(k.trim())
                .map_err(|_| DispatchError::InvalidRequest(format!("invalid header name '{k}'")))?;
            let value = HeaderValue::from_str(v.trim()).map_err(|_| {
                DispatchError::InvalidRequest(format!("invalid value for header '{k}'"))
            })?;
            req.headers_mut().insert(key, value);
        }
        if !self.body.is_empty() {
            *req.body_mut() = Some(self.body.clone().into());
        }
        Ok(req)
    }
}

fn serialize_request(
    method: &str,
    url: &reqwest::Url,
    headers: &[(String, String)],
    body: &str,
) -> String {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let mut host = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port() {
        host.push(':');
        host.push_str(&port.to_string());
    }

    let mut out = format!("{method} {target} HTTP/1.1\r\nHost: {host}\r\n");
    for (k, v) in headers {
        out.push_str(k);
        out.push_str(": ");
        out.push_str(v);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

pub(crate) fn parse_raw_request(raw: &str) -> Result<ParsedRequest, String> {
    let (head, body) = raw
        .split_once("\r\n\r\n")
        .or_else(|| raw.split_once("\n\n"))
        .ok_or_else(|| "missing end of request headers".to_string())?;

    let mut lines = head.lines();
    let request_line = lines
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| "missing request line".to_string())?;
    let parts: Vec<&str> = request_line.split(' ').collect();
    if parts.len() != 3 {
        return Err(format!("malformed request line '{request_line}'"));
    }
    let (method, target, version) = (parts[0], parts[1], parts[2]);
    if method.is_empty() || target.is_empty() || !version.starts_with("HTTP/") {
        return Err(format!("malformed request line '{request_line}'"));
    }

    let mut headers = Vec::new();
    for line in lines {
        let (k, v) = line
            .split_once(':')
            .ok_or_else(|| format!("malformed header line '{line}'"))?;
        let k = k.trim();
        if k.is_empty() || k.contains(char::is_whitespace) {
            return Err(format!("malformed header name '{k}'"));
        }
        headers.push((k.to_string(), v.trim().to_string()));
    }

    Ok(ParsedRequest {
        method: method.to_string(),
        target: target.to_string(),
        headers,
        body: body.to_string(),
    })
}
