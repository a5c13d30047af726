use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::LmsConfig;
use crate::error::LmsError;
use crate::extract::course::ContentExtractor;
use crate::extract::{AssignmentCandidate, BoardCandidate};
use crate::models::{Assignment, Board, Course, FileResource, Post, VideoLecture};
use crate::resolve::DeadlineResolver;
use crate::session::Fetcher;
use crate::store::{Store, Upsert};
use crate::summarize::Summarizer;

/// Row deltas for one entity category in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl CategoryCounts {
    fn record(&mut self, outcome: Upsert) {
        match outcome {
            Upsert::Inserted => self.inserted += 1,
            Upsert::Updated => self.updated += 1,
            Upsert::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    pub fn changed(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Outcome of one sync pass. Partial success is the normal failure mode:
/// per-board problems land in `failures` instead of aborting siblings, and
/// categories that already landed are never rolled back.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub course_id: i64,
    pub announcements: usize,
    pub assignments: CategoryCounts,
    pub videos: CategoryCounts,
    pub files: CategoryCounts,
    pub boards: CategoryCounts,
    pub posts: CategoryCounts,
    pub failures: Vec<String>,
}

impl SyncReport {
    pub fn changed_rows(&self) -> usize {
        self.assignments.changed()
            + self.videos.changed()
            + self.files.changed()
            + self.boards.changed()
            + self.posts.changed()
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "Synced course {}: {} announcements, {} assignments ({} changed), {} videos ({} changed), {} files ({} changed), {} boards ({} changed), {} posts ({} changed)",
            self.course_id,
            self.announcements,
            self.assignments.total(),
            self.assignments.changed(),
            self.videos.total(),
            self.videos.changed(),
            self.files.total(),
            self.files.changed(),
            self.boards.total(),
            self.boards.changed(),
            self.posts.total(),
            self.posts.changed(),
        );
        if !self.failures.is_empty() {
            line.push_str(&format!(
                "; {} failed: {}",
                self.failures.len(),
                self.failures.join("; ")
            ));
        }
        line
    }
}

/// The reconciler: merges scraped course contents into the per-owner store
/// with stable identities, so re-running against unchanged content is a
/// no-op.
pub struct SyncService {
    store: Arc<dyn Store>,
    extractor: ContentExtractor,
    resolver: DeadlineResolver,
    summarizer: Arc<dyn Summarizer>,
    // Scheduled full syncs and on-demand syncs must not interleave on one
    // owner's rows; passes serialize per owner. Entries are never evicted:
    // the map holds one `Arc<Mutex<()>>` per owner ever synced, which is
    // the intended ceiling for this service's lifetime.
    owner_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncService {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn Store>,
        summarizer: Arc<dyn Summarizer>,
        config: &LmsConfig,
    ) -> Self {
        Self {
            store,
            extractor: ContentExtractor::new(fetcher.clone(), config),
            resolver: DeadlineResolver::new(fetcher),
            summarizer,
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Sync one course for one owner. `SessionExpired` propagates so the
    /// caller can re-authenticate and retry; board-level failures degrade
    /// to notes in the report.
    pub async fn sync(&self, owner_id: &str, course_id: i64) -> Result<SyncReport, LmsError> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;
        self.sync_course(owner_id, course_id).await
    }

    /// Whole-account pass: refresh the enrolled-course list, then sync
    /// every active course. One course failing does not abort the others;
    /// an expired session aborts the whole pass.
    pub async fn sync_all(&self, owner_id: &str) -> Result<Vec<SyncReport>, LmsError> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;

        for listing in self.extractor.fetch_course_list().await? {
            let is_active = self
                .store
                .find_course(owner_id, listing.id)
                .await?
                .map(|existing| existing.is_active)
                .unwrap_or(true);
            let course = Course {
                id: listing.id,
                name: listing.name,
                is_active,
            };
            self.store.upsert_course(owner_id, &course).await?;
        }

        let mut reports = Vec::new();
        for course in self.store.list_courses(owner_id).await? {
            if !course.is_active {
                debug!(owner_id, course_id = course.id, "skipping inactive course");
                continue;
            }
            match self.sync_course(owner_id, course.id).await {
                Ok(report) => reports.push(report),
                Err(LmsError::SessionExpired) => return Err(LmsError::SessionExpired),
                Err(e) => {
                    warn!(owner_id, course_id = course.id, error = %e, "course sync failed")
                }
            }
        }
        Ok(reports)
    }

    async fn owner_lock(&self, owner_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.owner_locks.lock().await;
        locks
            .entry(owner_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn sync_course(&self, owner_id: &str, course_id: i64) -> Result<SyncReport, LmsError> {
        info!(owner_id, course_id, "sync pass starting");

        // First sight of a course gets a placeholder row; a later course
        // list refresh fills in the real name.
        if self.store.find_course(owner_id, course_id).await?.is_none() {
            self.store
                .upsert_course(owner_id, &Course::placeholder(course_id))
                .await?;
        }

        let contents = self.extractor.fetch_contents(course_id).await?;
        let mut report = SyncReport {
            course_id,
            announcements: contents.announcements.len(),
            ..Default::default()
        };

        for candidate in &contents.assignments {
            let outcome = self.sync_assignment(owner_id, course_id, candidate).await?;
            report.assignments.record(outcome);
        }

        for candidate in &contents.videos {
            let video = VideoLecture {
                module_id: candidate.module_id,
                course_id,
                title: candidate.title.clone(),
                url: candidate.url.clone(),
                start_date: candidate.start_date.clone(),
                end_date: candidate.end_date.clone(),
                is_completed: candidate.is_completed,
                has_tracking: candidate.has_tracking,
            };
            report
                .videos
                .record(self.store.upsert_video(owner_id, &video).await?);
        }

        for candidate in &contents.files {
            let file = FileResource {
                module_id: candidate.module_id,
                course_id,
                title: candidate.title.clone(),
                url: candidate.url.clone(),
                is_completed: candidate.is_completed,
            };
            report
                .files
                .record(self.store.upsert_file(owner_id, &file).await?);
        }

        for candidate in &contents.boards {
            if let Err(e) = self
                .sync_board(owner_id, course_id, candidate, &mut report)
                .await
            {
                warn!(owner_id, board_id = candidate.module_id, error = %e, "board sync failed");
                report.failures.push(format!(
                    "board {} ({}): {e}",
                    candidate.module_id, candidate.title
                ));
            }
        }

        if !contents.announcements.is_empty() {
            match self
                .summarizer
                .summarize_announcements(course_id, &contents.announcements)
                .await
            {
                Ok(digest) => {
                    debug!(course_id, digest_len = digest.len(), "announcement digest ready")
                }
                Err(e) => warn!(course_id, error = %e, "summarizer failed, continuing"),
            }
        }

        info!(owner_id, "{}", report.summary());
        Ok(report)
    }

    async fn sync_assignment(
        &self,
        owner_id: &str,
        course_id: i64,
        candidate: &AssignmentCandidate,
    ) -> Result<Upsert, LmsError> {
        let resolved = self.resolver.resolve(candidate).await;
        let existing = self
            .store
            .find_assignment(owner_id, course_id, candidate.module_id)
            .await?;

        // Deep-fetch deadline beats the inline one; a null result never
        // clears a previously stored value.
        let due_date = resolved
            .deadline
            .clone()
            .or_else(|| candidate.deadline_text.clone())
            .or_else(|| existing.as_ref().and_then(|a| a.due_date.clone()));

        // Completion follows the live scrape, strengthened by the detail
        // page when it confirms a submission.
        let is_completed = candidate.is_completed || resolved.confirmed_completed;

        let assignment = Assignment {
            module_id: candidate.module_id,
            course_id,
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            due_date,
            is_completed,
        };
        self.store.upsert_assignment(owner_id, &assignment).await
    }

    async fn sync_board(
        &self,
        owner_id: &str,
        course_id: i64,
        candidate: &BoardCandidate,
        report: &mut SyncReport,
    ) -> Result<(), LmsError> {
        let board = Board {
            board_id: candidate.module_id,
            course_id,
            title: candidate.title.clone(),
            url: candidate.url.clone(),
        };
        report
            .boards
            .record(self.store.upsert_board(owner_id, &board).await?);

        for summary in self.extractor.get_board_posts(candidate.module_id).await? {
            let existing = self
                .store
                .find_post(owner_id, candidate.module_id, &summary.url)
                .await?;

            // Post bodies are expensive to fetch; a body already cached is
            // never fetched again.
            let content = match existing.and_then(|post| post.content) {
                Some(cached) => Some(cached),
                None => Some(self.extractor.get_post_content(&summary.url).await?),
            };

            let post = Post {
                board_id: candidate.module_id,
                url: summary.url,
                title: summary.title,
                writer: summary.writer,
                date: summary.date,
                content,
            };
            report
                .posts
                .record(self.store.upsert_post(owner_id, &post).await?);
        }
        Ok(())
    }
}
