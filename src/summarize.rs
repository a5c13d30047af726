//! Seam to the external generative summarization service. The sync pass
//! hands announcements over and treats the returned text as opaque; a
//! failing summarizer never fails a sync.

use async_trait::async_trait;

use crate::error::LmsError;
use crate::extract::course::Announcement;

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize_announcements(
        &self,
        course_id: i64,
        announcements: &[Announcement],
    ) -> Result<String, LmsError>;
}

/// Default when no summarization collaborator is wired in.
pub struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn summarize_announcements(
        &self,
        _course_id: i64,
        _announcements: &[Announcement],
    ) -> Result<String, LmsError> {
        Ok(String::new())
    }
}
