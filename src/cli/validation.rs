use crate::cli::args::CliArgs;
use crate::output::{self, OutputFormat};

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(n) = args.concurrency {
        check_concurrency(n)?;
    }
    if let Some(raw) = args.extensions.as_deref() {
        crate::utils::parse_extensions_csv(raw)
            .map_err(|e| format!("invalid --extensions '{raw}': {e}"))?;
    }
    if let Some(raw) = args.headers.as_deref() {
        crate::utils::split_header_fields(raw, ",")
            .map_err(|e| format!("invalid --headers '{raw}': {e}"))?;
    }
    if let Some(k) = args.keyword.as_deref() {
        if k.is_empty() {
            return Err("invalid --keyword, expected a non-empty value".to_string());
        }
    }
    resolve_output_format(args.output.as_deref(), args.output_format.as_deref())?;
    Ok(())
}

pub fn check_concurrency(n: u32) -> Result<(), String> {
    if n == 0 || n > crate::runner::MAX_CONCURRENCY {
        return Err(format!(
            "invalid concurrency {n}, expected 1..={}",
            crate::runner::MAX_CONCURRENCY
        ));
    }
    Ok(())
}

/// An explicit format must be known; without one it is inferred from the
/// output path.
pub fn resolve_output_format(
    output: Option<&str>,
    format: Option<&str>,
) -> Result<Option<OutputFormat>, String> {
    let explicit = match format {
        Some(raw) => Some(
            OutputFormat::parse(raw)
                .ok_or_else(|| format!("invalid --output-format '{raw}', expected csv, txt or json"))?,
        ),
        None => None,
    };
    let Some(path) = output else {
        if explicit.is_some() {
            return Err("--output-format requires --output".to_string());
        }
        return Ok(None);
    };
    match explicit.or_else(|| output::infer_format_from_path(path)) {
        Some(f) => Ok(Some(f)),
        None => Err(format!(
            "cannot infer output format from '{path}', pass --output-format"
        )),
    }
}
