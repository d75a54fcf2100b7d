use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

fn scheme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("static regex"))
}

/// Normalizes a target into `scheme://host[:port]path[?query]` without a
/// trailing slash. A bare hostname gets `http://` prepended.
pub fn normalize_url(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("no URL/hostname provided".to_string());
    }
    let with_scheme = if scheme_re().is_match(raw) {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let trimmed = with_scheme.trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed)
        .map_err(|e| format!("unable to parse URL/hostname '{trimmed}': {e}"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("unsupported scheme '{}'", parsed.scheme()));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| format!("URL '{trimmed}' has no host"))?;

    let mut out = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    if parsed.path() != "/" || parsed.query().is_some() {
        out.push_str(parsed.path());
    }
    match parsed.query() {
        Some(query) => {
            out.push('?');
            out.push_str(query);
        }
        None => {
            while out.ends_with('/') {
                out.pop();
            }
        }
    }
    Ok(out)
}

/// Counts the non-empty lines of a wordlist file, matching what the
/// producer will enqueue. Lines are decoded the same lossy way.
pub async fn count_wordlist_lines(path: &str) -> std::io::Result<u64> {
    let handle = File::open(path).await?;
    let mut lines = BufReader::new(handle).split(b'\n');
    let mut count = 0u64;
    while let Some(raw) = lines.next_segment().await? {
        if !String::from_utf8_lossy(&raw).trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

/// Splits `Name: value` pairs separated by `sep`. A pair without a colon is
/// rejected.
pub fn split_header_fields(raw: &str, sep: &str) -> Result<Vec<(String, String)>, String> {
    let mut out = Vec::new();
    if raw.trim().is_empty() {
        return Ok(out);
    }
    for field in raw.split(sep) {
        let Some((name, value)) = field.split_once(':') else {
            return Err(format!(
                "malformed header '{}', missing ':' separator (expected name:value)",
                field.trim()
            ));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("malformed header '{}', empty name", field.trim()));
        }
        out.push((name.to_string(), value.trim().to_string()));
    }
    Ok(out)
}

/// Extensions must be a period followed by letters or digits.
pub fn is_valid_extension(ext: &str) -> bool {
    match ext.strip_prefix('.') {
        Some(rest) => rest.chars().all(|c| c.is_alphanumeric()),
        None => false,
    }
}

pub fn parse_extensions_csv(value: &str) -> Result<Vec<String>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if !is_valid_extension(item) {
            return Err(format!(
                "invalid extension '{item}', extensions must be a period followed by alphanumeric characters (e.g. .php,.html)"
            ));
        }
        if seen.insert(item.to_string()) {
            out.push(item.to_string());
        }
    }
    Ok(out)
}

/// Lower-cases `input` and upper-cases the first letter of every word.
/// Letters, digits and underscores continue a word, anything else separates.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_separator = true;
    for ch in input.chars() {
        if prev_separator {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        prev_separator = !(ch.is_alphanumeric() || ch == '_');
    }
    out
}

/// Lenient comma-separated set, values that do not parse are dropped.
pub fn parse_hide_set<T>(input: &str) -> HashSet<T>
where
    T: std::str::FromStr + std::hash::Hash + Eq,
{
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<T>().ok())
        .collect()
}

pub fn parse_http_method(value: &str) -> Result<reqwest::Method, String> {
    let canonical = value.trim().to_ascii_uppercase();
    if canonical.is_empty() {
        return Err("HTTP method is empty".to_string());
    }
    reqwest::Method::from_bytes(canonical.as_bytes())
        .map_err(|_| format!("invalid HTTP method '{value}'"))
}
