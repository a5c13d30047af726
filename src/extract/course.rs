use std::sync::Arc;

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::info;

use crate::config::LmsConfig;
use crate::error::LmsError;
use crate::session::{self, Fetcher};

use super::html;
use super::{scan_activities, AssignmentCandidate, BoardCandidate, FileCandidate, RawActivity, VideoCandidate};

static ANNOUNCEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<li class="article-list-item">\s*<a href="([^"]+)">.*?<div class="article-subject"[^>]*title="([^"]+)">.*?<div class="article-date">([^<]+)</div>"#,
    )
    .expect("static regex is valid")
});
static COURSE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)href="[^"]*course/user\.php\?mode=grade&amp;id=(\d+)&amp;user=\d+"[^>]*>(.*?)</a>"#)
        .expect("static regex is valid")
});
static COURSE_LINK_FALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)id=(\d+)&amp;user=\d+"[^>]*>(.*?)</a>"#).expect("static regex is valid")
});

/// Course announcement, extracted from the repeating list at the top of the
/// page. Announcements are not persisted by this engine; they are handed to
/// the external summarization collaborator only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub subject: String,
    pub date: String,
    pub url: String,
}

/// An enrolled course as listed on the grade-report overview page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseListing {
    pub id: i64,
    pub name: String,
}

/// Everything one course page yields, categorized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseContents {
    pub announcements: Vec<Announcement>,
    pub assignments: Vec<AssignmentCandidate>,
    pub videos: Vec<VideoCandidate>,
    pub files: Vec<FileCandidate>,
    pub boards: Vec<BoardCandidate>,
}

/// Fetches course pages through an owner's session and turns them into
/// categorized candidates.
pub struct ContentExtractor {
    fetcher: Arc<dyn Fetcher>,
    base_url: String,
}

impl ContentExtractor {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &LmsConfig) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.clone(),
        }
    }

    pub(crate) fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and categorize one course page. A response that is itself the
    /// login page surfaces as `SessionExpired`; the caller decides how to
    /// re-authenticate, nothing is retried here.
    pub async fn fetch_contents(&self, course_id: i64) -> Result<CourseContents, LmsError> {
        let url = format!("{}/course/view.php?id={course_id}", self.base_url);
        let page = self.fetcher.get_page(&url).await?;
        if session::looks_like_login_page(&page) {
            return Err(LmsError::SessionExpired);
        }

        let contents = parse_course_page(&page);
        info!(
            course_id,
            announcements = contents.announcements.len(),
            assignments = contents.assignments.len(),
            videos = contents.videos.len(),
            files = contents.files.len(),
            boards = contents.boards.len(),
            "course page extracted"
        );
        Ok(contents)
    }

    /// Enrolled courses, scraped from the grade-report overview page
    /// (duplicate links collapse to the first occurrence).
    pub async fn fetch_course_list(&self) -> Result<Vec<CourseListing>, LmsError> {
        let url = format!("{}/grade/report/overview/index.php", self.base_url);
        let page = self.fetcher.get_page(&url).await?;
        if session::looks_like_login_page(&page) {
            return Err(LmsError::SessionExpired);
        }
        Ok(parse_course_list(&page))
    }
}

pub fn parse_course_page(page: &str) -> CourseContents {
    let mut contents = CourseContents {
        announcements: parse_announcements(page),
        ..Default::default()
    };

    for activity in scan_activities(page) {
        match activity {
            RawActivity::Assignment(a) => contents.assignments.push(a),
            RawActivity::Video(v) => contents.videos.push(v),
            RawActivity::File(f) => contents.files.push(f),
            RawActivity::Board(b) => contents.boards.push(b),
        }
    }
    contents
}

fn parse_announcements(page: &str) -> Vec<Announcement> {
    ANNOUNCEMENT_RE
        .captures_iter(page)
        .filter_map(|caps| {
            Some(Announcement {
                url: html::decode_entities(caps.get(1)?.as_str()),
                subject: html::decode_entities(caps.get(2)?.as_str()),
                date: caps.get(3)?.as_str().trim().to_string(),
            })
        })
        .collect()
}

pub fn parse_course_list(page: &str) -> Vec<CourseListing> {
    let mut listings = Vec::new();
    let mut seen = HashSet::new();

    let primary: Vec<_> = COURSE_LINK_RE.captures_iter(page).collect();
    let captures = if primary.is_empty() {
        COURSE_LINK_FALLBACK_RE.captures_iter(page).collect()
    } else {
        primary
    };

    for caps in captures {
        let (Some(id), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Ok(id) = id.as_str().parse::<i64>() else {
            continue;
        };
        if seen.insert(id) {
            listings.push(CourseListing {
                id,
                name: html::strip_tags(name.as_str()),
            });
        }
    }
    listings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcements_come_from_the_article_list() {
        let page = r#"
        <ul class="article-list">
          <li class="article-list-item">
            <a href="https://lms/mod/ubboard/article.php?id=9&amp;bwid=77">
              <div class="article-subject" title="Midterm room change">Midterm…</div>
              <div class="article-date"> 2025-09-18 </div>
            </a>
          </li>
          <li class="article-list-item">
            <a href="https://lms/mod/ubboard/article.php?id=9&amp;bwid=78">
              <div class="article-subject" title="Office hours">Office…</div>
              <div class="article-date">2025-09-19</div>
            </a>
          </li>
        </ul>"#;

        let contents = parse_course_page(page);
        assert_eq!(contents.announcements.len(), 2);
        assert_eq!(contents.announcements[0].subject, "Midterm room change");
        assert_eq!(contents.announcements[0].date, "2025-09-18");
        assert_eq!(
            contents.announcements[0].url,
            "https://lms/mod/ubboard/article.php?id=9&bwid=77"
        );
    }

    #[test]
    fn course_list_dedupes_by_id() {
        let page = r#"
        <a href="https://lms/course/user.php?mode=grade&amp;id=101&amp;user=7">Data Structures</a>
        <a href="https://lms/course/user.php?mode=grade&amp;id=101&amp;user=7">Data Structures</a>
        <a href="https://lms/course/user.php?mode=grade&amp;id=102&amp;user=7"><span>Operating</span> Systems</a>
        "#;
        let listings = parse_course_list(page);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0], CourseListing { id: 101, name: "Data Structures".into() });
        assert_eq!(listings[1].name, "Operating Systems");
    }

    #[test]
    fn course_list_uses_fallback_pattern() {
        let page = r#"<a href="/u.php?x=1&amp;id=55&amp;user=7" class="c">Networks</a>"#;
        let listings = parse_course_list(page);
        assert_eq!(listings, vec![CourseListing { id: 55, name: "Networks".into() }]);
    }
}
