//! Decoding of the player's bootstrap call.
//!
//! The viewer page embeds one `amd.progress(...)` call whose fixed-order
//! argument list parameterizes the tracking protocol for that lecture. The
//! positions are a versioned external contract; decoding validates the
//! argument count once and maps the magic indices to named fields. Any
//! shape mismatch decodes to `None` — the emulator fails closed instead of
//! indexing blindly.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static PROGRESS_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)amd\.progress\((.*?)\);").expect("static regex is valid"));

/// Positions carried by contract (0-based): 0 tag id, 1 progress-enabled,
/// 6 course id, 7 module id, 8 track id, 9 attempt, 10 total duration in
/// seconds, 12 heartbeat interval in milliseconds, 22 log timestamp.
const MIN_ARG_COUNT: usize = 23;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressArgs {
    pub tag_id: String,
    pub progress_enabled: bool,
    pub course_id: i64,
    pub cmid: i64,
    pub track_id: i64,
    pub attempt: i64,
    pub duration_secs: u64,
    pub interval_ms: u64,
    pub logtime: String,
}

pub fn decode_progress_args(page: &str) -> Option<ProgressArgs> {
    let caps = PROGRESS_CALL_RE.captures(page)?;
    let raw = caps.get(1)?.as_str();
    let args = split_top_level(raw);
    if args.len() < MIN_ARG_COUNT {
        debug!(found = args.len(), expected = MIN_ARG_COUNT, "bootstrap argument list too short");
        return None;
    }

    Some(ProgressArgs {
        tag_id: args[0].clone(),
        progress_enabled: parse_bool(&args[1])?,
        course_id: args[6].parse().ok()?,
        cmid: args[7].parse().ok()?,
        track_id: args[8].parse().ok()?,
        attempt: args[9].parse().ok()?,
        duration_secs: parse_number(&args[10])?,
        interval_ms: parse_number(&args[12])?,
        logtime: args[22].clone(),
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_number(s: &str) -> Option<u64> {
    if let Ok(n) = s.parse::<u64>() {
        return Some(n);
    }
    // The embed occasionally emits fractional numbers.
    s.parse::<f64>().ok().filter(|n| *n >= 0.0).map(|n| n as u64)
}

/// Split a JS argument list on top-level commas, honoring quotes, escapes
/// and bracket nesting. Quote characters are dropped; `\/` unwinds to `/`.
fn split_top_level(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth: u32 = 0;

    for ch in raw.chars() {
        if let Some(q) = quote {
            if escaped {
                current.push(ch);
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            } else {
                current.push(ch);
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '[' | '(' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !raw.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer_page(duration: u64, progress: &str) -> String {
        format!(
            r#"<script>
            require(['mod_vod/viewer'], function(amd) {{
                amd.progress('vod-tag-1', {progress}, 0, 0, 0, true, 279348, 277509, 91445, 2,
                             {duration}, 0, 60000, 0, 0, 0, 0, 0, 0, 0, 0, 0, '1758500000', 'x', 'y', 'z');
            }});
            </script>"#
        )
    }

    #[test]
    fn decodes_named_fields_from_contract_positions() {
        let page = viewer_page(3600, "true");
        let args = decode_progress_args(&page).expect("decodes");
        assert_eq!(
            args,
            ProgressArgs {
                tag_id: "vod-tag-1".into(),
                progress_enabled: true,
                course_id: 279348,
                cmid: 277509,
                track_id: 91445,
                attempt: 2,
                duration_secs: 3600,
                interval_ms: 60000,
                logtime: "1758500000".into(),
            }
        );
    }

    #[test]
    fn quoted_strings_may_contain_commas_and_escapes() {
        let page = r#"amd.progress('a, with \'comma\'', true, 'https:\/\/cdn\/v.mp4', 0, 0, 0, 1, 2, 3, 4, 10, 0, 1000, 0, 0, 0, 0, 0, 0, 0, 0, 0, 't', 0, 0, 0);"#;
        let args = decode_progress_args(page).expect("decodes");
        assert_eq!(args.tag_id, "a, with 'comma'");
        assert_eq!(args.course_id, 1);
        assert_eq!(args.logtime, "t");
    }

    #[test]
    fn short_argument_list_fails_closed() {
        assert!(decode_progress_args("amd.progress('a', true, 1);").is_none());
    }

    #[test]
    fn missing_call_fails_closed() {
        assert!(decode_progress_args("<html>no player here</html>").is_none());
    }

    #[test]
    fn malformed_flag_fails_closed() {
        let page = viewer_page(3600, "maybe");
        assert!(decode_progress_args(&page).is_none());
    }

    #[test]
    fn disabled_progress_decodes_as_false() {
        let page = viewer_page(3600, "false");
        let args = decode_progress_args(&page).expect("decodes");
        assert!(!args.progress_enabled);
    }
}
