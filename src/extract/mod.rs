//! Course-page activity extraction.
//!
//! The inbound HTML is uncontrolled and versioned by the remote site, so
//! every step here degrades to null/unknown instead of failing: an
//! unrecognized fragment is dropped with a debug note, a missing signal
//! means "not completed", a missing date stays unresolved.

pub mod board;
pub mod course;
pub mod dates;
pub mod html;

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static ACTIVITY_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<li[^>]*class="activity\s+([^"]+)"[^>]*id="module-(\d+)"[^>]*>"#)
        .expect("static regex is valid")
});
static INSTANCE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span class="instancename">(.*?)<"#).expect("static regex is valid")
});
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]+)""#).expect("static regex is valid"));
static DATE_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2})\s*~\s*(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2})")
        .expect("static regex is valid")
});
static DEADLINE_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Due:|due is|deadline is|마감:|일시:|종료일시:)\s*([^<]+)")
        .expect("static regex is valid")
});
static BARE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}").expect("static regex is valid")
});

/// Assignment-category subkinds. Quiz and feedback activities sync as
/// assignments; quiz completion is only trustworthy from the quiz's own
/// status page, so quizzes are always deep-fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    Assignment,
    Quiz,
    Feedback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentCandidate {
    pub module_id: i64,
    pub title: String,
    pub url: String,
    pub is_completed: bool,
    pub kind: AssignmentKind,
    /// Inline deadline text from the course page, first matching
    /// alternative; `None` is left for the deadline resolver.
    pub deadline_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCandidate {
    pub module_id: i64,
    pub title: String,
    pub url: String,
    pub is_completed: bool,
    pub has_tracking: bool,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub module_id: i64,
    pub title: String,
    pub url: String,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardCandidate {
    pub module_id: i64,
    pub title: String,
    pub url: String,
}

/// One classified activity fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawActivity {
    Assignment(AssignmentCandidate),
    Video(VideoCandidate),
    File(FileCandidate),
    Board(BoardCandidate),
}

/// Scan a course page for activity fragments and classify each one.
///
/// A fragment is the activity element's own balanced subtree. Fragments
/// whose marker token is unrecognized are dropped, never fatal.
pub fn scan_activities(page: &str) -> Vec<RawActivity> {
    let mut activities = Vec::new();

    for caps in ACTIVITY_OPEN_RE.captures_iter(page) {
        let Some(whole) = caps.get(0) else { continue };
        let (Some(markers), Some(id)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Ok(module_id) = id.as_str().parse::<i64>() else {
            continue;
        };
        let Some(fragment) = html::li_subtree(page, whole.start()) else {
            debug!(module_id, "activity element never closes; skipping fragment");
            continue;
        };

        match classify_fragment(markers.as_str(), module_id, fragment) {
            Some(activity) => activities.push(activity),
            None => {
                debug!(module_id, markers = markers.as_str(), "unrecognized activity type");
            }
        }
    }

    activities
}

fn classify_fragment(markers: &str, module_id: i64, fragment: &str) -> Option<RawActivity> {
    let title = fragment_title(fragment);
    let url = fragment_url(fragment);
    let is_completed = completion_signal(fragment);

    if markers.contains("modtype_assign") {
        Some(RawActivity::Assignment(AssignmentCandidate {
            module_id,
            title,
            url,
            is_completed,
            kind: AssignmentKind::Assignment,
            deadline_text: inline_deadline(fragment),
        }))
    } else if markers.contains("modtype_quiz") || markers.contains("quiz") {
        Some(RawActivity::Assignment(AssignmentCandidate {
            module_id,
            title,
            url,
            is_completed,
            kind: AssignmentKind::Quiz,
            deadline_text: inline_deadline(fragment),
        }))
    } else if markers.contains("modtype_feedback") || markers.contains("modtype_survey") {
        Some(RawActivity::Assignment(AssignmentCandidate {
            module_id,
            title,
            url,
            is_completed,
            kind: AssignmentKind::Feedback,
            deadline_text: inline_deadline(fragment),
        }))
    } else if markers.contains("modtype_vod") {
        let (start_date, end_date) = date_range(fragment);
        Some(RawActivity::Video(VideoCandidate {
            module_id,
            title,
            url,
            is_completed,
            // Lectures without an autocompletion span are not tracked and
            // can never become completed through the emulator.
            has_tracking: fragment.contains(r#"class="autocompletion""#),
            start_date,
            end_date,
        }))
    } else if markers.contains("modtype_ubfile") {
        Some(RawActivity::File(FileCandidate {
            module_id,
            title,
            url,
            is_completed,
        }))
    } else if markers.contains("modtype_ubboard") {
        Some(RawActivity::Board(BoardCandidate {
            module_id,
            title,
            url,
        }))
    } else {
        None
    }
}

/// Innermost display name, with decorative nested markup stripped.
fn fragment_title(fragment: &str) -> String {
    INSTANCE_NAME_RE
        .captures(fragment)
        .and_then(|caps| caps.get(1))
        .map(|m| html::strip_tags(m.as_str()))
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn fragment_url(fragment: &str) -> String {
    HREF_RE
        .captures(fragment)
        .and_then(|caps| caps.get(1))
        .map(|m| html::decode_entities(m.as_str()))
        .unwrap_or_default()
}

/// Fixed-priority completion fallback chain: explicit completion-state
/// marker, then completion alt-text, then success-styled completion text.
/// No signal at all means not completed.
fn completion_signal(fragment: &str) -> bool {
    if fragment.contains("completion-auto-y") || fragment.contains("completion-manual-y") {
        return true;
    }
    if fragment.contains(r#"alt="Completed:"#) || fragment.contains(r#"alt="완료:"#) {
        return true;
    }
    fragment.contains("text-success")
        && (fragment.contains("Completed") || fragment.contains("완료"))
}

/// Availability window from the explicit `start ~ end` token, if present.
fn date_range(fragment: &str) -> (Option<String>, Option<String>) {
    match DATE_RANGE_RE.captures(fragment) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str().to_string()),
            caps.get(2).map(|m| m.as_str().to_string()),
        ),
        None => (None, None),
    }
}

/// Label-keyed deadline alternatives tried first, then a bare date pattern;
/// first match wins, otherwise the resolver takes over.
fn inline_deadline(fragment: &str) -> Option<String> {
    if let Some(caps) = DEADLINE_LABEL_RE.captures(fragment) {
        let text = html::normalize_ws(&html::decode_entities(caps.get(1)?.as_str()));
        if !text.is_empty() {
            return Some(text);
        }
    }
    BARE_DATE_RE
        .find(fragment)
        .map(|m| m.as_str().to_string())
}
