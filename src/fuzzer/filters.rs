use std::collections::HashSet;

use super::FuzzResult;
use crate::utils::parse_hide_set;

const STATUS_NOT_FOUND: u16 = 404;

// raw comma-separated hide values as they come from the cli or config file
#[derive(Clone, Debug, Default)]
pub struct HideConfig {
    pub status: String,
    pub size: String,
    pub words: String,
    pub lines: String,
    pub header_size: String,
    pub show_404: bool,
}

#[derive(Clone, Debug, Default)]
pub struct HideFilters {
    pub(crate) status: HashSet<u16>,
    pub(crate) size: HashSet<usize>,
    pub(crate) words: HashSet<usize>,
    pub(crate) lines: HashSet<usize>,
    pub(crate) header_size: HashSet<usize>,
}

impl HideFilters {
    pub fn from_config(cfg: &HideConfig) -> Self {
        let mut status = parse_hide_set(&cfg.status);
        if !cfg.show_404 {
            status.insert(STATUS_NOT_FOUND);
        }
        Self {
            status,
            size: parse_hide_set(&cfg.size),
            words: parse_hide_set(&cfg.words),
            lines: parse_hide_set(&cfg.lines),
            header_size: parse_hide_set(&cfg.header_size),
        }
    }

    pub fn is_visible(&self, result: &FuzzResult) -> bool {
        !self.status.contains(&result.status)
            && !self.size.contains(&result.content_length)
            && !self.words.contains(&result.words)
            && !self.lines.contains(&result.lines)
            && !self.header_size.contains(&result.header_size)
    }
}
