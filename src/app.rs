use clap::Parser;
use itertools::Itertools;
use tokio::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::fuzzer::HideConfig;
use crate::output::{OutputFormat, OutputSink, TableSink};
use crate::runner::{Options, Runner, ScanChannels, WordlistSource};

#[derive(Clone, Debug)]
struct RunConfig {
    options: Options,
    output: Option<(String, OutputFormat)>,
    no_color: bool,
    verbose: u8,
}

fn print_banner() {
    const BANNER: &str = r#"
    __                        __
   / /____  ___________  ____/ /___
  / //_/ / / / ___/ __ \/ __  / __ \
 / ,< / /_/ / /  / /_/ / /_/ / /_/ /
/_/|_|\__,_/_/   \____/\__,_/\____/
"#;
    print!("{}", BANNER);
    println!("       v{} - HTTP content discovery", env!("CARGO_PKG_VERSION"));
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<12}: {}", label, value);
}

fn format_opt_value<'a>(v: &'a str, default: &'a str) -> &'a str {
    if v.trim().is_empty() {
        default
    } else {
        v
    }
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

fn summarize_filters(hide: &HideConfig) -> String {
    let mut parts = [
        ("status", &hide.status),
        ("size", &hide.size),
        ("words", &hide.words),
        ("lines", &hide.lines),
        ("header", &hide.header_size),
    ]
    .iter()
    .filter(|(_, value)| !value.trim().is_empty())
    .map(|(name, value)| format!("{}={}", name, value.trim()))
    .join(" ");
    if !hide.show_404 {
        if !parts.is_empty() {
            parts.push(' ');
        }
        parts.push_str("404");
    }
    parts
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kurodo={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let show_progress = !(args.no_progress || cfg.no_progress.unwrap_or(false));

    let url = args
        .url
        .or(cfg.url)
        .ok_or_else(|| "a target is required (--url)".to_string())?;
    let wordlist = args
        .wordlist
        .or(cfg.wordlist)
        .map(|p| config::expand_tilde_string(&p))
        .ok_or_else(|| "a wordlist is required (--wordlist)".to_string())?;

    let concurrency = args.concurrency.or(cfg.concurrency).unwrap_or(8);
    validation::check_concurrency(concurrency)?;
    let timeout_ms = args.timeout.or(cfg.timeout).unwrap_or(10_000);
    let sleep_ms = args.sleep.or(cfg.sleep).unwrap_or(0);
    let max_retries = args.max_retries.or(cfg.max_retries).unwrap_or(3);
    let rate = args.rate.or(cfg.rate).filter(|r| *r > 0);
    let progress_interval_ms = args
        .progress_interval
        .or(cfg.progress_interval)
        .unwrap_or(75);

    let follow_redirects = args.follow_redirects || cfg.follow_redirects.unwrap_or(false);
    let proxy = args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty());

    let method = args
        .method
        .or(cfg.method)
        .unwrap_or_else(|| "GET".to_string())
        .trim()
        .to_ascii_uppercase();
    let keyword = args.keyword.or(cfg.keyword).unwrap_or_else(|| "FUZZ".to_string());
    let body = args.data.or(cfg.data).unwrap_or_default();
    let header = args.headers.or(cfg.headers).filter(|h| !h.trim().is_empty());
    let user_agent = args.user_agent.or(cfg.user_agent);
    let cookie = args.cookie.or(cfg.cookie);

    let extensions_raw = args.extensions.or(cfg.extensions).unwrap_or_default();
    let extensions = crate::utils::parse_extensions_csv(&extensions_raw)
        .map_err(|e| format!("invalid --extensions '{extensions_raw}': {e}"))?;

    let hide = HideConfig {
        status: args.hide_status.or(cfg.hide_status).unwrap_or_default(),
        size: args.hide_size.or(cfg.hide_size).unwrap_or_default(),
        words: args.hide_words.or(cfg.hide_words).unwrap_or_default(),
        lines: args.hide_lines.or(cfg.hide_lines).unwrap_or_default(),
        header_size: args
            .hide_header_size
            .or(cfg.hide_header_size)
            .unwrap_or_default(),
        show_404: args.show_404 || cfg.show_404.unwrap_or(false),
    };

    let output_path = args
        .output
        .or(cfg.output)
        .map(|p| config::expand_tilde_string(&p));
    let output_format = args.output_format.or(cfg.output_format);
    let output = validation::resolve_output_format(output_path.as_deref(), output_format.as_deref())?
        .and_then(|format| output_path.map(|path| (path, format)));

    Ok(RunConfig {
        options: Options {
            url,
            wordlist: WordlistSource::FilePath(wordlist),
            extensions,
            header,
            user_agent,
            cookie,
            method,
            body,
            keyword,
            concurrency,
            timeout_ms,
            follow_redirects,
            proxy,
            sleep_ms,
            max_retries,
            hide,
            progress: show_progress,
            progress_interval_ms,
            rate,
        },
        output,
        no_color,
        verbose: args.verbose,
    })
}

fn print_settings(run: &RunConfig, runner: &Runner) {
    let opts = runner.options();
    format_kv_line("URL", &opts.url);
    if let WordlistSource::FilePath(path) = &opts.wordlist {
        format_kv_line("Wordlist", path);
    }
    format_kv_line(
        "Request",
        &format!(
            "method={} keyword={} ({}) extensions={}",
            opts.method,
            opts.keyword,
            if runner.keyword_present() {
                "in template"
            } else {
                "appended to path"
            },
            if opts.extensions.is_empty() {
                "none".to_string()
            } else {
                opts.extensions.iter().join(",")
            }
        ),
    );
    format_kv_line(
        "HTTP",
        &format!(
            "threads={} timeout={}ms retries={} sleep={}ms redirects={} proxy={} rate={}",
            opts.concurrency,
            opts.timeout_ms,
            opts.max_retries,
            opts.sleep_ms,
            format_bool(opts.follow_redirects),
            format_bool(opts.proxy.is_some()),
            opts.rate
                .map(|r| format!("{r}/s"))
                .unwrap_or_else(|| "off".to_string())
        ),
    );
    let filters = summarize_filters(&opts.hide);
    format_kv_line("Hide", format_opt_value(&filters, "none"));
    if let Some((path, format)) = run.output.as_ref() {
        format_kv_line("Output", &format!("{} ({:?})", path, format));
    }
    println!();
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();

    let runner = Runner::new(run.options.clone()).map_err(|e| e.to_string())?;
    print_settings(&run, &runner);

    // the file is created before scanning so a bad path fails early
    let mut sinks = vec![OutputSink::Table(TableSink::new(run.options.progress)?)];
    match run.output.as_ref() {
        Some((path, format)) => sinks.push(OutputSink::for_file(path, *format).await?),
        None => sinks.push(OutputSink::Null),
    }
    for sink in sinks.iter_mut() {
        sink.initialize().await?;
    }

    let now = Instant::now();
    let ScanChannels {
        mut results,
        mut progress,
        finished,
    } = runner.start().await.map_err(|e| e.to_string())?;

    let mut results_open = true;
    let mut progress_open = true;
    while results_open || progress_open {
        tokio::select! {
            r = results.recv(), if results_open => match r {
                Some(r) => {
                    for sink in sinks.iter_mut() {
                        sink.emit_result(&r).await?;
                    }
                }
                None => results_open = false,
            },
            p = progress.recv(), if progress_open => match p {
                Some(p) => {
                    for sink in sinks.iter_mut() {
                        sink.emit_progress(p);
                    }
                }
                None => progress_open = false,
            },
        }
    }

    let summary = finished
        .await
        .map_err(|_| "scan stopped before reporting a summary".to_string())?;
    debug!("summary: {:?}", summary);
    for sink in sinks.iter_mut() {
        sink.finalize(&summary).await?;
    }

    let elapsed_time = now.elapsed();
    println!();
    println!(
        ":: Completed :: {} requests :: {} results :: scan took {}s ::",
        summary.completed,
        summary.emitted,
        elapsed_time.as_secs()
    );
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => {
            // --help and --version
            let _ = e.print();
            return Ok(());
        }
        Err(e) => return Err(e.to_string()),
    };

    init_tracing(args.verbose);

    let cfg = match args.config.clone() {
        Some(path) => config::load_config(&config::expand_tilde(&path), false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;
    debug!("verbosity level {}", run.verbose);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
