use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::error::LmsError;

use super::course::ContentExtractor;
use super::html;

static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tr>(.*?)</tr>").expect("static regex is valid"));
static ROW_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a href="([^"]+)">\s*(.*?)\s*</a>"#).expect("static regex is valid")
});
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<td[^>]*>(.*?)</td>").expect("static regex is valid"));
static POST_CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<div class="content">.*?<div class="text_to_html">(.*?)</div>"#)
        .expect("static regex is valid")
});

/// Placeholder body for posts whose detail page carries no content block.
pub const EMPTY_POST_CONTENT: &str = "No content found.";

/// One row of a board's post table. Identity is the post URL; the site
/// exposes no reliable numeric id and titles can collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostSummary {
    pub title: String,
    pub writer: String,
    pub date: String,
    pub url: String,
}

impl ContentExtractor {
    /// List the posts of one board (list page only; bodies are fetched
    /// separately and cached by the reconciler).
    pub async fn get_board_posts(&self, board_module_id: i64) -> Result<Vec<PostSummary>, LmsError> {
        let url = format!("{}/mod/ubboard/view.php?id={board_module_id}", self.base_url());
        let page = self.fetcher().get_page(&url).await?;
        let posts = parse_board_posts(&page);
        if posts.is_empty() {
            warn!(board_module_id, "no post table found on board page");
        } else {
            info!(board_module_id, posts = posts.len(), "board posts listed");
        }
        Ok(posts)
    }

    /// Fetch one post's body. A missing content block degrades to a fixed
    /// placeholder rather than an error.
    pub async fn get_post_content(&self, post_url: &str) -> Result<String, LmsError> {
        let page = self.fetcher().get_page(post_url).await?;
        Ok(parse_post_content(&page))
    }
}

pub fn parse_board_posts(page: &str) -> Vec<PostSummary> {
    let Some(tbody) = html::slice_between(page, "<tbody", "</tbody>") else {
        return Vec::new();
    };

    let mut posts = Vec::new();
    for row_caps in ROW_RE.captures_iter(tbody) {
        let Some(row) = row_caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        // Rows without an anchor are spacers or "no posts" notices.
        let Some(link) = ROW_LINK_RE.captures(row) else {
            continue;
        };
        let (Some(url), Some(title)) = (link.get(1), link.get(2)) else {
            continue;
        };

        let cells: Vec<String> = CELL_RE
            .captures_iter(row)
            .filter_map(|caps| caps.get(1).map(|m| html::strip_tags(m.as_str())))
            .collect();
        let (writer, date) = if cells.len() >= 4 {
            (cells[2].clone(), cells[3].clone())
        } else {
            ("Unknown".to_string(), "Unknown".to_string())
        };

        posts.push(PostSummary {
            title: html::strip_tags(title.as_str()),
            writer,
            date,
            url: html::decode_entities(url.as_str()),
        });
    }
    posts
}

pub fn parse_post_content(page: &str) -> String {
    POST_CONTENT_RE
        .captures(page)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| EMPTY_POST_CONTENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARD_PAGE: &str = r#"
    <table class="ubboard">
      <thead><tr><td>No</td><td>Subject</td><td>Writer</td><td>Date</td></tr></thead>
      <tbody>
        <tr>
          <td class="tcenter">2</td>
          <td class="subject"><a href="https://lms/mod/ubboard/article.php?id=9&amp;bwid=78"> Second notice </a></td>
          <td class="tcenter">Prof. Kim</td>
          <td class="tcenter">2025-09-19</td>
          <td class="tcenter">12</td>
        </tr>
        <tr>
          <td class="tcenter">1</td>
          <td class="subject"><a href="https://lms/mod/ubboard/article.php?id=9&amp;bwid=77">First notice</a></td>
          <td class="tcenter">TA Lee</td>
          <td class="tcenter">2025-09-18</td>
          <td class="tcenter">30</td>
        </tr>
        <tr><td colspan="5">footer spacer</td></tr>
      </tbody>
    </table>"#;

    #[test]
    fn parses_rows_with_writer_and_date_cells() {
        let posts = parse_board_posts(BOARD_PAGE);
        assert_eq!(posts.len(), 2);
        assert_eq!(
            posts[0],
            PostSummary {
                title: "Second notice".into(),
                writer: "Prof. Kim".into(),
                date: "2025-09-19".into(),
                url: "https://lms/mod/ubboard/article.php?id=9&bwid=78".into(),
            }
        );
        assert_eq!(posts[1].writer, "TA Lee");
    }

    #[test]
    fn page_without_table_yields_nothing() {
        assert!(parse_board_posts("<html><body>moved</body></html>").is_empty());
    }

    #[test]
    fn post_content_is_the_text_to_html_block() {
        let page = r#"<div class="content"><h3>t</h3><div class="text_to_html"> Bring the handout. </div></div>"#;
        assert_eq!(parse_post_content(page), "Bring the handout.");
        assert_eq!(parse_post_content("<html></html>"), EMPTY_POST_CONTENT);
    }
}
