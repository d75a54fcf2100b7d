use reqwest::header::HeaderMap;

use super::{DispatchError, FuzzResult, ResolvedRequest};

/// Incremental body counters. Chunks can split words anywhere, so the
/// in-word state carries over between calls to `feed`.
#[derive(Clone, Debug, Default)]
pub struct BodyMetrics {
    pub bytes: usize,
    pub lines: usize,
    pub words: usize,
    in_word: bool,
}

impl BodyMetrics {
    pub fn feed(&mut self, chunk: &[u8]) {
        self.bytes += chunk.len();
        for &b in chunk {
            if b == b'\n' {
                self.lines += 1;
            }
            // a run of letters counts once it is closed by a non-letter,
            // a run still open at end of body is not counted
            let letter = char::from(b).is_alphabetic();
            if letter {
                self.in_word = true;
            } else if self.in_word {
                self.words += 1;
                self.in_word = false;
            }
        }
    }
}

pub fn count_words(body: &[u8]) -> usize {
    let mut m = BodyMetrics::default();
    m.feed(body);
    m.words
}

/// Length of every distinct header name plus every value it carries.
pub fn header_size(headers: &HeaderMap) -> usize {
    headers
        .keys()
        .map(|name| {
            name.as_str().len()
                + headers
                    .get_all(name)
                    .iter()
                    .map(|v| v.as_bytes().len())
                    .sum::<usize>()
        })
        .sum()
}

// declared length wins unless it is missing or negative
fn declared_content_length(headers: &HeaderMap) -> Option<usize> {
    let raw = headers.get(reqwest::header::CONTENT_LENGTH)?;
    let value = raw.to_str().ok()?.trim().parse::<i64>().ok()?;
    usize::try_from(value).ok()
}

pub async fn fetch(
    client: &reqwest::Client,
    resolved: &ResolvedRequest,
    position: usize,
) -> Result<FuzzResult, DispatchError> {
    let req = resolved.build(client)?;
    let mut resp = client.execute(req).await?;

    let status = resp.status().as_u16();
    let headers = resp.headers().clone();

    let mut metrics = BodyMetrics::default();
    while let Some(chunk) = resp.chunk().await.map_err(DispatchError::Body)? {
        metrics.feed(&chunk);
    }

    Ok(FuzzResult {
        content_length: declared_content_length(&headers).unwrap_or(metrics.bytes),
        words: metrics.words,
        lines: metrics.lines,
        header_size: header_size(&headers),
        status,
        label: resolved.label.clone(),
        position,
    })
}
