use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::fuzzer::{FuzzResult, ProgressSnapshot};
use crate::runner::ScanSummary;

const CSV_HEADER: &str = "content_length;words;lines;header_size;status;result";
const TEXT_HEADER: &str = "content_length\twords\tlines\theader_size\tstatus\tresult";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".csv") {
        return Some(OutputFormat::Csv);
    }
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

pub fn csv_row(r: &FuzzResult) -> String {
    format!(
        "{};{};{};{};{};{}",
        r.content_length, r.words, r.lines, r.header_size, r.status, r.label
    )
}

pub fn text_row(r: &FuzzResult) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        r.content_length, r.words, r.lines, r.header_size, r.status, r.label
    )
}

fn colorize_status(status: u16) -> String {
    // pad first, escape codes would throw off the width
    let padded = format!("{:<8}", status);
    match status {
        200..=299 => padded.bold().green().to_string(),
        300..=399 => padded.bold().blue().to_string(),
        400..=499 => padded.bold().yellow().to_string(),
        500..=599 => padded.bold().red().to_string(),
        _ => padded.bold().white().to_string(),
    }
}

fn table_row(r: &FuzzResult) -> String {
    format!(
        "{}{:<10}{:<8}{:<8}{:<8}{}",
        colorize_status(r.status),
        r.content_length,
        r.words,
        r.lines,
        r.header_size,
        r.label.bold().cyan()
    )
}

/// Terminal table with a live progress line on stderr.
pub struct TableSink {
    pb: ProgressBar,
    show_progress: bool,
}

impl TableSink {
    pub fn new(show_progress: bool) -> Result<Self, String> {
        if !show_progress {
            return Ok(Self {
                pb: ProgressBar::hidden(),
                show_progress,
            });
        }
        let pb = ProgressBar::new(0);
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.enable_steady_tick(Duration::from_millis(200));
        pb.set_style(
            ProgressStyle::with_template(
                ":: Progress: [{pos}/~{len}] :: {per_sec} :: Duration: [{elapsed_precise}]",
            )
            .map_err(|e| format!("failed to build progress bar style: {e}"))?
            .progress_chars(r#"#>-"#),
        );
        Ok(Self { pb, show_progress })
    }

    fn line(&self, line: String) {
        if self.show_progress {
            self.pb.println(line);
        } else {
            println!("{line}");
        }
    }
}

pub struct FileSink {
    path: String,
    file: File,
}

impl FileSink {
    /// Creates (or truncates) the file right away so a bad path fails early.
    pub async fn create(path: &str) -> Result<Self, String> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|e| format!("failed to open output file {path}: {e}"))?;
        Ok(Self {
            path: path.to_string(),
            file,
        })
    }

    async fn write_line(&mut self, line: &str) -> Result<(), String> {
        self.file
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| format!("failed to write output file {}: {e}", self.path))
    }

    async fn flush(&mut self) -> Result<(), String> {
        self.file
            .flush()
            .await
            .map_err(|e| format!("failed to flush output file {}: {e}", self.path))
    }
}

pub enum OutputSink {
    Table(TableSink),
    Csv(FileSink),
    Text(FileSink),
    Json {
        file: FileSink,
        results: Vec<FuzzResult>,
    },
    Null,
}

impl OutputSink {
    pub async fn for_file(path: &str, format: OutputFormat) -> Result<Self, String> {
        let file = FileSink::create(path).await?;
        Ok(match format {
            OutputFormat::Csv => OutputSink::Csv(file),
            OutputFormat::Text => OutputSink::Text(file),
            OutputFormat::Json => OutputSink::Json {
                file,
                results: Vec::new(),
            },
        })
    }

    pub async fn initialize(&mut self) -> Result<(), String> {
        match self {
            OutputSink::Table(t) => {
                t.line(format!(
                    "{:<8}{:<10}{:<8}{:<8}{:<8}{}",
                    "Code", "Length", "Words", "Lines", "Header", "Result"
                ));
                t.line(format!("{}", "-".repeat(60)));
                Ok(())
            }
            OutputSink::Csv(f) => f.write_line(CSV_HEADER).await,
            OutputSink::Text(f) => f.write_line(TEXT_HEADER).await,
            OutputSink::Json { .. } | OutputSink::Null => Ok(()),
        }
    }

    pub async fn emit_result(&mut self, result: &FuzzResult) -> Result<(), String> {
        match self {
            OutputSink::Table(t) => {
                t.line(table_row(result));
                Ok(())
            }
            OutputSink::Csv(f) => f.write_line(&csv_row(result)).await,
            OutputSink::Text(f) => f.write_line(&text_row(result)).await,
            OutputSink::Json { results, .. } => {
                results.push(result.clone());
                Ok(())
            }
            OutputSink::Null => Ok(()),
        }
    }

    pub fn emit_progress(&mut self, snapshot: ProgressSnapshot) {
        if let OutputSink::Table(t) = self {
            t.pb.set_length(snapshot.approx_total);
            t.pb.set_position(snapshot.done);
        }
    }

    pub async fn finalize(&mut self, summary: &ScanSummary) -> Result<(), String> {
        match self {
            OutputSink::Table(t) => {
                t.pb.set_length(summary.approx_total);
                t.pb.set_position(summary.completed);
                t.pb.finish_and_clear();
                Ok(())
            }
            OutputSink::Csv(f) | OutputSink::Text(f) => f.flush().await,
            OutputSink::Json { file, results } => {
                let rendered = serde_json::to_vec_pretty(&*results)
                    .map_err(|e| format!("failed to serialize results: {e}"))?;
                file.file
                    .write_all(&rendered)
                    .await
                    .map_err(|e| format!("failed to write output file {}: {e}", file.path))?;
                file.flush().await
            }
            OutputSink::Null => Ok(()),
        }
    }
}
