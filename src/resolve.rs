//! Deadline resolver: deep-fetches of activity detail pages.
//!
//! The course page's inline deadline text is best-effort; assignment-like
//! items without one get a secondary fetch of their detail page. Quizzes
//! are always deep-fetched, because quiz completion is only reliable from
//! the quiz's own status page.

use std::sync::Arc;

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::extract::html;
use crate::extract::{AssignmentCandidate, AssignmentKind};
use crate::session::Fetcher;

static QUIZ_DEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"종료일시\s*:\s*(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2})").expect("static regex is valid")
});
static TABLE_DEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<td[^>]*>.*?(?:Due date|마감 일시|Deadline|종료일시|일시).*?</td>\s*<td[^>]*>(.*?)</td>")
        .expect("static regex is valid")
});

/// Status keywords that confirm submission/completion on a detail page, in
/// the site's two display languages.
const COMPLETION_KEYWORDS: &[&str] = &[
    "종료됨",
    "제출됨",
    "마감됨",
    "최종 점수",
    "Final grade",
    "Submitted for grading",
    "Graded",
    "Finished",
];

/// What one deep fetch learned. `deadline = None` means the page had no
/// recognizable deadline; `confirmed_completed` can only strengthen the
/// inline signal, never weaken it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDetail {
    pub deadline: Option<String>,
    pub confirmed_completed: bool,
}

pub struct DeadlineResolver {
    fetcher: Arc<dyn Fetcher>,
}

impl DeadlineResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Quizzes always; anything else only when the inline extraction came
    /// up empty.
    pub fn needs_deep_fetch(candidate: &AssignmentCandidate) -> bool {
        candidate.kind == AssignmentKind::Quiz || candidate.deadline_text.is_none()
    }

    /// Deep-fetch one item's detail page. A failed fetch means "nothing
    /// learned": logged, never fatal to the sync pass.
    pub async fn resolve(&self, candidate: &AssignmentCandidate) -> ResolvedDetail {
        if !Self::needs_deep_fetch(candidate) || candidate.url.is_empty() {
            return ResolvedDetail::default();
        }
        debug!(module_id = candidate.module_id, url = %candidate.url, "deep fetching detail page");
        match self.fetcher.get_page(&candidate.url).await {
            Ok(page) => parse_detail_page(&page),
            Err(e) => {
                warn!(module_id = candidate.module_id, error = %e, "detail page fetch failed");
                ResolvedDetail::default()
            }
        }
    }
}

pub fn parse_detail_page(page: &str) -> ResolvedDetail {
    ResolvedDetail {
        deadline: detail_deadline(page),
        confirmed_completed: COMPLETION_KEYWORDS.iter().any(|kw| page.contains(kw)),
    }
}

/// The quiz-style `종료일시 : …` label first, then a label-keyed table scan
/// over the deadline-label synonyms.
fn detail_deadline(page: &str) -> Option<String> {
    if let Some(caps) = QUIZ_DEADLINE_RE.captures(page) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    let caps = TABLE_DEADLINE_RE.captures(page)?;
    let text = html::strip_tags(&html::decode_entities(caps.get(1)?.as_str()));
    (!text.is_empty()).then_some(text)
}
