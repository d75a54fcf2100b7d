use std::sync::Arc;

use governor::DefaultDirectRateLimiter;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Split};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{RequestDescriptor, RequestTemplate};

pub enum WordlistReader {
    File {
        lines: Split<BufReader<File>>,
        path: String,
    },
    Inline(std::vec::IntoIter<String>),
}

impl WordlistReader {
    pub async fn open(path: &str) -> std::io::Result<Self> {
        let handle = File::open(path).await?;
        Ok(WordlistReader::File {
            lines: BufReader::new(handle).split(b'\n'),
            path: path.to_string(),
        })
    }

    pub fn inline(entries: Vec<String>) -> Self {
        WordlistReader::Inline(entries.into_iter())
    }

    /// Next non-empty, trimmed entry. Bytes that are not UTF-8 are decoded
    /// lossily; an I/O error ends the wordlist.
    pub async fn next_entry(&mut self) -> Option<String> {
        loop {
            let line = match self {
                WordlistReader::Inline(iter) => iter.next()?,
                WordlistReader::File { lines, path } => match lines.next_segment().await {
                    Ok(Some(raw)) => String::from_utf8_lossy(&raw).into_owned(),
                    Ok(None) => return None,
                    Err(e) => {
                        warn!("error reading wordlist {}: {}, stopping early", path, e);
                        return None;
                    }
                },
            };
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
}

/// Enqueues one descriptor per (entry, extension) pair in wordlist order and
/// returns how many were sent. Dropping `tx` on return closes the queue.
pub async fn produce_requests(
    tx: mpsc::Sender<RequestDescriptor>,
    mut reader: WordlistReader,
    template: Arc<RequestTemplate>,
    extensions: Vec<Arc<str>>,
    limiter: Option<DefaultDirectRateLimiter>,
) -> usize {
    let mut sent = 0usize;
    let mut position = 0usize;

    while let Some(entry) = reader.next_entry().await {
        for ext in extensions.iter() {
            if let Some(lim) = limiter.as_ref() {
                lim.until_ready().await;
            }
            let desc = RequestDescriptor {
                template: template.clone(),
                entry: entry.clone(),
                extension: ext.clone(),
                position,
                retries: 0,
            };
            if tx.send(desc).await.is_err() {
                debug!("request queue closed after {} descriptors", sent);
                return sent;
            }
            sent += 1;
        }
        position += 1;
    }

    debug!("wordlist exhausted, {} descriptors queued", sent);
    sent
}
