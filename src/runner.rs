use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use governor::{Quota, RateLimiter};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::fuzzer::producer::{self, WordlistReader};
use crate::fuzzer::progress;
use crate::fuzzer::worker::{self, WorkerContext};
use crate::fuzzer::{
    FuzzResult, HideConfig, HideFilters, ProgressSnapshot, RequestCounters, RequestTemplate,
    TemplateError,
};
use crate::utils;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0";
pub const MAX_CONCURRENCY: u32 = 100;

#[derive(Clone, Debug)]
pub enum WordlistSource {
    FilePath(String),
    Inline(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct Options {
    pub url: String,
    pub wordlist: WordlistSource,
    pub extensions: Vec<String>,
    pub header: Option<String>,
    pub user_agent: Option<String>,
    pub cookie: Option<String>,
    pub method: String,
    pub body: String,
    pub keyword: String,
    pub concurrency: u32,
    pub timeout_ms: u64,
    pub follow_redirects: bool,
    pub proxy: Option<String>,
    pub sleep_ms: u64,
    pub max_retries: u8,
    pub hide: HideConfig,
    pub progress: bool,
    pub progress_interval_ms: u64,
    pub rate: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            url: String::new(),
            wordlist: WordlistSource::FilePath(String::new()),
            extensions: Vec::new(),
            header: None,
            user_agent: None,
            cookie: None,
            method: "GET".to_string(),
            body: String::new(),
            keyword: "FUZZ".to_string(),
            concurrency: 8,
            timeout_ms: 10_000,
            follow_redirects: false,
            proxy: None,
            sleep_ms: 0,
            max_retries: 3,
            hide: HideConfig::default(),
            progress: true,
            progress_interval_ms: 75,
            rate: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid URL: {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("a wordlist is required")]
    MissingWordlist,

    #[error("keyword must not be empty")]
    EmptyKeyword,

    #[error("invalid concurrency {value}, expected 1..=100")]
    InvalidConcurrency { value: u32 },

    #[error("{message}")]
    MalformedHeader { message: String },

    #[error("{message}")]
    InvalidExtension { message: String },

    #[error("{message}")]
    InvalidMethod { message: String },

    #[error("failed to open file for {kind}: {path}: {source}")]
    FileOpen {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("scan stopped before reporting a summary")]
    Aborted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ScanSummary {
    pub produced: u64,
    pub completed: u64,
    pub approx_total: u64,
    pub emitted: u64,
}

/// Streams of a running scan. Both receivers have to be drained (or dropped)
/// for the scan to make progress.
pub struct ScanChannels {
    pub results: mpsc::Receiver<FuzzResult>,
    pub progress: mpsc::Receiver<ProgressSnapshot>,
    pub finished: oneshot::Receiver<ScanSummary>,
}

#[derive(Clone, Debug)]
pub struct ScanResult {
    pub elapsed: Duration,
    pub results: Vec<FuzzResult>,
    pub progress: Vec<ProgressSnapshot>,
    pub summary: ScanSummary,
}

#[derive(Clone, Debug)]
pub struct Runner {
    options: Options,
    template: Arc<RequestTemplate>,
    filters: Arc<HideFilters>,
    extensions: Vec<Arc<str>>,
    client: reqwest::Client,
}

impl Runner {
    pub fn new(mut options: Options) -> Result<Self, RunnerError> {
        let url = utils::normalize_url(&options.url).map_err(|message| RunnerError::InvalidUrl {
            url: options.url.clone(),
            message,
        })?;
        options.url = url;
        if options.keyword.is_empty() {
            return Err(RunnerError::EmptyKeyword);
        }
        if options.concurrency == 0 || options.concurrency > MAX_CONCURRENCY {
            return Err(RunnerError::InvalidConcurrency {
                value: options.concurrency,
            });
        }
        if let WordlistSource::FilePath(p) = &options.wordlist {
            if p.trim().is_empty() {
                return Err(RunnerError::MissingWordlist);
            }
        }
        for ext in options.extensions.iter() {
            if !utils::is_valid_extension(ext) {
                return Err(RunnerError::InvalidExtension {
                    message: format!(
                        "invalid extension '{ext}', extensions must be a period followed by alphanumeric characters"
                    ),
                });
            }
        }

        let headers = request_headers(&options)?;
        let template = RequestTemplate::new(
            &options.keyword,
            &options.method,
            &options.url,
            headers,
            &options.body,
            &options.extensions,
        )
        .map_err(|e| match e {
            TemplateError::EmptyKeyword => RunnerError::EmptyKeyword,
            TemplateError::InvalidUrl { url, message } => RunnerError::InvalidUrl { url, message },
            TemplateError::InvalidMethod(message) => RunnerError::InvalidMethod { message },
            TemplateError::InvalidHeader(message) => RunnerError::MalformedHeader { message },
        })?;

        let mut extensions: Vec<Arc<str>> = options
            .extensions
            .iter()
            .map(|e| Arc::from(e.as_str()))
            .collect();
        if extensions.is_empty() {
            extensions.push(Arc::from(""));
        }

        let client = build_client(
            options.proxy.as_deref(),
            options.timeout_ms,
            options.follow_redirects,
        )?;

        Ok(Self {
            filters: Arc::new(HideFilters::from_config(&options.hide)),
            template: Arc::new(template),
            extensions,
            client,
            options,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn keyword_present(&self) -> bool {
        self.template.keyword_present()
    }

    /// Spawns the pipeline and hands back its output streams. Only opening
    /// the wordlist can fail here, everything after that is per request.
    pub async fn start(&self) -> Result<ScanChannels, RunnerError> {
        let reader = match &self.options.wordlist {
            WordlistSource::FilePath(path) => {
                WordlistReader::open(path)
                    .await
                    .map_err(|e| RunnerError::FileOpen {
                        kind: "wordlist",
                        path: path.clone(),
                        source: e,
                    })?
            }
            WordlistSource::Inline(entries) => WordlistReader::inline(entries.clone()),
        };

        let concurrency = self.options.concurrency as usize;
        let counters = Arc::new(RequestCounters::new());

        let (queue_tx, queue_rx) = mpsc::channel(concurrency * concurrency);
        let (result_tx, result_rx) = mpsc::channel::<FuzzResult>(concurrency);
        let (progress_tx, progress_rx) = mpsc::channel::<ProgressSnapshot>(concurrency);
        let (finished_tx, finished_rx) = oneshot::channel::<ScanSummary>();
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        // the line count runs next to the producer and gates the first tick
        let ext_count = self.extensions.len() as u64;
        let count_handle = {
            let counters = counters.clone();
            let wordlist = self.options.wordlist.clone();
            tokio::spawn(async move {
                let lines = match wordlist {
                    WordlistSource::FilePath(path) => {
                        match utils::count_wordlist_lines(&path).await {
                            Ok(n) => n,
                            Err(e) => {
                                warn!("failed to count lines of {}: {}", path, e);
                                0
                            }
                        }
                    }
                    WordlistSource::Inline(entries) => {
                        entries.iter().filter(|e| !e.trim().is_empty()).count() as u64
                    }
                };
                counters.add_expected(lines * ext_count);
                let _ = ready_tx.send(());
            })
        };

        let estimator = if self.options.progress {
            let interval = Duration::from_millis(self.options.progress_interval_ms.max(1));
            Some(tokio::spawn(progress::run_estimator(
                counters.clone(),
                interval,
                ready_rx,
                stop_rx,
                progress_tx,
            )))
        } else {
            drop(progress_tx);
            None
        };

        let limiter = self
            .options
            .rate
            .and_then(NonZeroU32::new)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));

        let ctx = WorkerContext {
            client: self.client.clone(),
            filters: self.filters.clone(),
            counters: counters.clone(),
            max_retries: self.options.max_retries,
            sleep: Duration::from_millis(self.options.sleep_ms),
        };
        let template = self.template.clone();
        let extensions = self.extensions.clone();
        let target = self.options.url.clone();

        tokio::spawn(async move {
            info!(
                "starting scan of {} with {} workers (keyword present: {})",
                target,
                concurrency,
                template.keyword_present()
            );

            let producer_handle = tokio::spawn(producer::produce_requests(
                queue_tx, reader, template, extensions, limiter,
            ));

            let queue = Arc::new(Mutex::new(queue_rx));
            let workers = FuturesUnordered::new();
            for id in 0..concurrency {
                workers.push(tokio::spawn(worker::run_worker(
                    id,
                    ctx.clone(),
                    queue.clone(),
                    result_tx.clone(),
                )));
            }
            // only the workers may keep the queue alive, once they are gone
            // the producer sees a closed queue
            drop(queue);
            drop(result_tx);

            let produced = match producer_handle.await {
                Ok(n) => n as u64,
                Err(e) => {
                    warn!("producer task failed: {}", e);
                    0
                }
            };
            debug!("producer finished after {} descriptors", produced);

            let joined: Vec<_> = workers.collect().await;
            for res in joined {
                if let Err(e) = res {
                    warn!("worker task failed: {}", e);
                }
            }

            if let Err(e) = count_handle.await {
                warn!("line count task failed: {}", e);
            }
            let _ = stop_tx.send(());
            if let Some(handle) = estimator {
                let _ = handle.await;
            }

            let summary = ScanSummary {
                produced,
                completed: counters.done(),
                approx_total: counters.approx_total(),
                emitted: counters.emitted(),
            };
            info!(
                "scan finished: {} requests, {} results",
                summary.completed, summary.emitted
            );
            let _ = finished_tx.send(summary);
        });

        Ok(ScanChannels {
            results: result_rx,
            progress: progress_rx,
            finished: finished_rx,
        })
    }

    /// Runs the scan to completion and collects everything it produced.
    pub async fn run(&self) -> Result<ScanResult, RunnerError> {
        let started_at = Instant::now();
        let ScanChannels {
            mut results,
            mut progress,
            finished,
        } = self.start().await?;

        let mut collected = Vec::new();
        let mut snapshots = Vec::new();
        let mut results_open = true;
        let mut progress_open = true;
        while results_open || progress_open {
            tokio::select! {
                r = results.recv(), if results_open => match r {
                    Some(r) => collected.push(r),
                    None => results_open = false,
                },
                p = progress.recv(), if progress_open => match p {
                    Some(p) => snapshots.push(p),
                    None => progress_open = false,
                },
            }
        }

        let summary = finished.await.map_err(|_| RunnerError::Aborted)?;
        Ok(ScanResult {
            elapsed: started_at.elapsed(),
            results: collected,
            progress: snapshots,
            summary,
        })
    }
}

// user agent, cookie and custom headers, in that order
fn request_headers(options: &Options) -> Result<Vec<(String, String)>, RunnerError> {
    let mut headers = vec![(
        "User-Agent".to_string(),
        options
            .user_agent
            .clone()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
    )];
    if let Some(cookie) = options.cookie.as_deref().filter(|c| !c.trim().is_empty()) {
        headers.push(("Cookie".to_string(), cookie.trim().to_string()));
    }
    if let Some(raw) = options.header.as_deref() {
        let custom = utils::split_header_fields(raw, ",")
            .map_err(|message| RunnerError::MalformedHeader { message })?;
        headers.extend(custom);
    }
    Ok(headers)
}

fn build_client(
    proxy: Option<&str>,
    timeout_ms: u64,
    follow_redirects: bool,
) -> Result<reqwest::Client, RunnerError> {
    let redirect_policy = if follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    let mut builder = reqwest::Client::builder()
        .redirect(redirect_policy)
        .danger_accept_invalid_hostnames(true)
        .danger_accept_invalid_certs(true);
    // 0 disables the timeout
    if timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(timeout_ms));
    }

    match proxy.filter(|p| !p.trim().is_empty()) {
        Some(proxy) => {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| RunnerError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }
        None => builder = builder.no_proxy(),
    }

    builder
        .build()
        .map_err(|e| RunnerError::HttpClientBuild { source: e })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(url: &str) -> Options {
        Options {
            url: url.to_string(),
            wordlist: WordlistSource::Inline(vec!["admin".to_string()]),
            ..Default::default()
        }
    }

    #[test]
    fn new_normalizes_url() {
        let runner = Runner::new(options("example.com/")).unwrap();
        assert_eq!(runner.options().url, "http://example.com");
        assert!(!runner.keyword_present());
    }

    #[test]
    fn new_rejects_bad_options() {
        assert!(matches!(
            Runner::new(options("ftp://example.com")),
            Err(RunnerError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Runner::new(Options {
                concurrency: 101,
                ..options("example.com")
            }),
            Err(RunnerError::InvalidConcurrency { value: 101 })
        ));
        assert!(matches!(
            Runner::new(Options {
                keyword: String::new(),
                ..options("example.com")
            }),
            Err(RunnerError::EmptyKeyword)
        ));
        assert!(matches!(
            Runner::new(Options {
                header: Some("X-A: 1,broken".to_string()),
                ..options("example.com")
            }),
            Err(RunnerError::MalformedHeader { .. })
        ));
        assert!(matches!(
            Runner::new(Options {
                extensions: vec!["php".to_string()],
                ..options("example.com")
            }),
            Err(RunnerError::InvalidExtension { .. })
        ));
        assert!(matches!(
            Runner::new(Options {
                method: "GE T".to_string(),
                ..options("example.com")
            }),
            Err(RunnerError::InvalidMethod { .. })
        ));
        assert!(matches!(
            Runner::new(Options {
                wordlist: WordlistSource::FilePath(" ".to_string()),
                ..options("example.com")
            }),
            Err(RunnerError::MissingWordlist)
        ));
    }

    #[test]
    fn request_headers_keep_order() {
        let headers = request_headers(&Options {
            cookie: Some("session=1".to_string()),
            header: Some("X-A: 1,X-B: 2".to_string()),
            ..Default::default()
        })
        .unwrap();
        let names: Vec<&str> = headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["User-Agent", "Cookie", "X-A", "X-B"]);
        assert_eq!(headers[0].1, DEFAULT_USER_AGENT);
    }

    #[tokio::test]
    async fn start_fails_on_missing_wordlist_file() {
        let runner = Runner::new(Options {
            wordlist: WordlistSource::FilePath("/definitely/not/here.txt".to_string()),
            ..options("example.com")
        })
        .unwrap();
        assert!(matches!(
            runner.start().await,
            Err(RunnerError::FileOpen { .. })
        ));
    }
}
