use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "kurodo",
    version,
    about = "concurrent HTTP content-discovery fuzzer",
    long_about = "Kurodo requests every wordlist entry (optionally combined with file extensions) against a target and reports the responses that survive the hide filters.\n\nPlace the keyword (FUZZ by default) anywhere in the URL, headers, method or body to fuzz that position; without it entries are appended to the URL path.\n\nExamples:\n  kurodo -u https://target.tld -w words.txt -x .php,.bak\n  kurodo -u https://target.tld/api/FUZZ -w words.txt --hc 403 -t 32\n  kurodo -u https://target.tld/login -m POST -d 'user=admin&pass=FUZZ' -w passwords.txt\n\nTip: Use --config to persist scan settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv, -vvv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'n',
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        long = "no-progress",
        help_heading = "Output",
        help = "Do not render the progress line."
    )]
    pub no_progress: bool,

    #[arg(
        long = "progress-interval",
        value_name = "MS",
        help_heading = "Output",
        help = "Progress refresh interval in milliseconds (default 75)."
    )]
    pub progress_interval: Option<u64>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write results to a file."
    )]
    pub output: Option<String>,

    #[arg(
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: csv, txt or json (inferred from the file extension when omitted)."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'u',
        long = "url",
        value_name = "URL",
        help_heading = "Input",
        help = "Target URL or hostname."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'w',
        long = "wordlist",
        value_name = "FILE",
        help_heading = "Input",
        help = "Wordlist file path (one entry per line)."
    )]
    pub wordlist: Option<String>,

    #[arg(
        short = 'x',
        long = "extensions",
        value_name = "EXTENSIONS",
        help_heading = "Input",
        help = "Extensions appended to every entry, comma-separated (e.g. .php,.html)."
    )]
    pub extensions: Option<String>,

    #[arg(
        short = 'k',
        long = "keyword",
        value_name = "WORD",
        help_heading = "Input",
        help = "Placeholder replaced by wordlist entries (default FUZZ)."
    )]
    pub keyword: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.kurodo/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'm',
        long = "method",
        value_name = "METHOD",
        help_heading = "HTTP",
        help = "HTTP method (default GET)."
    )]
    pub method: Option<String>,

    #[arg(
        short = 'd',
        long = "data",
        value_name = "BODY",
        help_heading = "HTTP",
        help = "Request body."
    )]
    pub data: Option<String>,

    #[arg(
        short = 'H',
        long = "headers",
        value_name = "HEADERS",
        help_heading = "HTTP",
        help = "Extra headers, comma-separated (format: 'Key: Value,Key2: Value2')."
    )]
    pub headers: Option<String>,

    #[arg(
        short = 'a',
        long = "user-agent",
        value_name = "UA",
        help_heading = "HTTP",
        help = "User-Agent header value."
    )]
    pub user_agent: Option<String>,

    #[arg(
        short = 'c',
        long = "cookie",
        value_name = "COOKIE",
        help_heading = "HTTP",
        help = "Cookie header value."
    )]
    pub cookie: Option<String>,

    #[arg(
        short = 'f',
        long = "follow-redirects",
        help_heading = "HTTP",
        help = "Follow HTTP redirects."
    )]
    pub follow_redirects: bool,

    #[arg(
        short = 'p',
        long = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "timeout",
        value_name = "MS",
        help_heading = "HTTP",
        help = "Per-request timeout in milliseconds, 0 disables it (default 10000)."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 't',
        long = "concurrency",
        value_name = "N",
        help_heading = "Performance",
        help = "Number of concurrent workers, 1 to 100 (default 8)."
    )]
    pub concurrency: Option<u32>,

    #[arg(
        short = 's',
        long = "sleep",
        value_name = "MS",
        help_heading = "Performance",
        help = "Delay each worker waits after a request, in milliseconds."
    )]
    pub sleep: Option<u64>,

    #[arg(
        short = 'r',
        long = "max-retries",
        value_name = "N",
        help_heading = "Performance",
        help = "Retries for a request that fails (default 3)."
    )]
    pub max_retries: Option<u8>,

    #[arg(
        long = "rate",
        value_name = "RPS",
        help_heading = "Performance",
        help = "Request rate limit (requests per second)."
    )]
    pub rate: Option<u32>,

    #[arg(
        long = "hc",
        visible_alias = "hide-status",
        value_name = "SET",
        help_heading = "Filters",
        help = "Hide responses with these status codes (comma-separated)."
    )]
    pub hide_status: Option<String>,

    #[arg(
        long = "hh",
        visible_alias = "hide-size",
        value_name = "SET",
        help_heading = "Filters",
        help = "Hide responses with these content lengths (comma-separated)."
    )]
    pub hide_size: Option<String>,

    #[arg(
        long = "hw",
        visible_alias = "hide-words",
        value_name = "SET",
        help_heading = "Filters",
        help = "Hide responses with these word counts (comma-separated)."
    )]
    pub hide_words: Option<String>,

    #[arg(
        long = "hl",
        visible_alias = "hide-lines",
        value_name = "SET",
        help_heading = "Filters",
        help = "Hide responses with these line counts (comma-separated)."
    )]
    pub hide_lines: Option<String>,

    #[arg(
        long = "hr",
        visible_alias = "hide-header-size",
        value_name = "SET",
        help_heading = "Filters",
        help = "Hide responses with these header sizes (comma-separated)."
    )]
    pub hide_header_size: Option<String>,

    #[arg(
        long = "show-404",
        help_heading = "Filters",
        help = "Show 404 responses (hidden by default)."
    )]
    pub show_404: bool,
}
