//! Persistence contract.
//!
//! The engine never talks to a database directly: it consumes a store
//! through upsert-by-identity per entity kind. Identity tuples follow the
//! data model (course: owner + external id; module entities: course +
//! module id; posts: board + URL). Duplicate-identity conflicts resolve as
//! last-write-wins; genuinely concurrent writers to one entity are not
//! defended against.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LmsError;
use crate::models::{Assignment, Board, Course, FileResource, Post, VideoLecture};

/// Outcome of one upsert, so a sync pass can report exact row deltas and
/// re-running against unchanged content is observably a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    Unchanged,
}

impl Upsert {
    pub fn changed(self) -> bool {
        !matches!(self, Upsert::Unchanged)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_course(&self, owner_id: &str, course_id: i64) -> Result<Option<Course>, LmsError>;
    async fn upsert_course(&self, owner_id: &str, course: &Course) -> Result<Upsert, LmsError>;
    async fn list_courses(&self, owner_id: &str) -> Result<Vec<Course>, LmsError>;

    async fn find_assignment(
        &self,
        owner_id: &str,
        course_id: i64,
        module_id: i64,
    ) -> Result<Option<Assignment>, LmsError>;
    async fn upsert_assignment(&self, owner_id: &str, assignment: &Assignment) -> Result<Upsert, LmsError>;

    async fn find_video(
        &self,
        owner_id: &str,
        course_id: i64,
        module_id: i64,
    ) -> Result<Option<VideoLecture>, LmsError>;
    async fn upsert_video(&self, owner_id: &str, video: &VideoLecture) -> Result<Upsert, LmsError>;

    async fn find_file(
        &self,
        owner_id: &str,
        course_id: i64,
        module_id: i64,
    ) -> Result<Option<FileResource>, LmsError>;
    async fn upsert_file(&self, owner_id: &str, file: &FileResource) -> Result<Upsert, LmsError>;

    async fn find_board(
        &self,
        owner_id: &str,
        course_id: i64,
        board_id: i64,
    ) -> Result<Option<Board>, LmsError>;
    async fn upsert_board(&self, owner_id: &str, board: &Board) -> Result<Upsert, LmsError>;

    async fn find_post(
        &self,
        owner_id: &str,
        board_id: i64,
        url: &str,
    ) -> Result<Option<Post>, LmsError>;
    async fn upsert_post(&self, owner_id: &str, post: &Post) -> Result<Upsert, LmsError>;
}

#[derive(Default)]
struct MemoryTables {
    courses: HashMap<(String, i64), Course>,
    assignments: HashMap<(String, i64, i64), Assignment>,
    videos: HashMap<(String, i64, i64), VideoLecture>,
    files: HashMap<(String, i64, i64), FileResource>,
    boards: HashMap<(String, i64, i64), Board>,
    posts: HashMap<(String, i64, String), Post>,
}

/// In-memory store for tests and for collaborators that bring no database.
/// Implements last-write-wins literally: an equal row is `Unchanged`, a
/// differing row is overwritten.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryTables>, LmsError> {
        self.tables
            .lock()
            .map_err(|_| LmsError::Store("memory store poisoned".to_string()))
    }
}

fn upsert_row<K: std::hash::Hash + Eq, V: Clone + PartialEq>(
    table: &mut HashMap<K, V>,
    key: K,
    row: &V,
) -> Upsert {
    match table.get(&key) {
        Some(existing) if existing == row => Upsert::Unchanged,
        Some(_) => {
            table.insert(key, row.clone());
            Upsert::Updated
        }
        None => {
            table.insert(key, row.clone());
            Upsert::Inserted
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_course(&self, owner_id: &str, course_id: i64) -> Result<Option<Course>, LmsError> {
        Ok(self.lock()?.courses.get(&(owner_id.to_string(), course_id)).cloned())
    }

    async fn upsert_course(&self, owner_id: &str, course: &Course) -> Result<Upsert, LmsError> {
        let mut tables = self.lock()?;
        Ok(upsert_row(&mut tables.courses, (owner_id.to_string(), course.id), course))
    }

    async fn list_courses(&self, owner_id: &str) -> Result<Vec<Course>, LmsError> {
        let tables = self.lock()?;
        let mut courses: Vec<Course> = tables
            .courses
            .iter()
            .filter(|((owner, _), _)| owner == owner_id)
            .map(|(_, course)| course.clone())
            .collect();
        courses.sort_by_key(|course| course.id);
        Ok(courses)
    }

    async fn find_assignment(
        &self,
        owner_id: &str,
        course_id: i64,
        module_id: i64,
    ) -> Result<Option<Assignment>, LmsError> {
        Ok(self
            .lock()?
            .assignments
            .get(&(owner_id.to_string(), course_id, module_id))
            .cloned())
    }

    async fn upsert_assignment(&self, owner_id: &str, assignment: &Assignment) -> Result<Upsert, LmsError> {
        let mut tables = self.lock()?;
        Ok(upsert_row(
            &mut tables.assignments,
            (owner_id.to_string(), assignment.course_id, assignment.module_id),
            assignment,
        ))
    }

    async fn find_video(
        &self,
        owner_id: &str,
        course_id: i64,
        module_id: i64,
    ) -> Result<Option<VideoLecture>, LmsError> {
        Ok(self
            .lock()?
            .videos
            .get(&(owner_id.to_string(), course_id, module_id))
            .cloned())
    }

    async fn upsert_video(&self, owner_id: &str, video: &VideoLecture) -> Result<Upsert, LmsError> {
        let mut tables = self.lock()?;
        Ok(upsert_row(
            &mut tables.videos,
            (owner_id.to_string(), video.course_id, video.module_id),
            video,
        ))
    }

    async fn find_file(
        &self,
        owner_id: &str,
        course_id: i64,
        module_id: i64,
    ) -> Result<Option<FileResource>, LmsError> {
        Ok(self
            .lock()?
            .files
            .get(&(owner_id.to_string(), course_id, module_id))
            .cloned())
    }

    async fn upsert_file(&self, owner_id: &str, file: &FileResource) -> Result<Upsert, LmsError> {
        let mut tables = self.lock()?;
        Ok(upsert_row(
            &mut tables.files,
            (owner_id.to_string(), file.course_id, file.module_id),
            file,
        ))
    }

    async fn find_board(
        &self,
        owner_id: &str,
        course_id: i64,
        board_id: i64,
    ) -> Result<Option<Board>, LmsError> {
        Ok(self
            .lock()?
            .boards
            .get(&(owner_id.to_string(), course_id, board_id))
            .cloned())
    }

    async fn upsert_board(&self, owner_id: &str, board: &Board) -> Result<Upsert, LmsError> {
        let mut tables = self.lock()?;
        Ok(upsert_row(
            &mut tables.boards,
            (owner_id.to_string(), board.course_id, board.board_id),
            board,
        ))
    }

    async fn find_post(
        &self,
        owner_id: &str,
        board_id: i64,
        url: &str,
    ) -> Result<Option<Post>, LmsError> {
        Ok(self
            .lock()?
            .posts
            .get(&(owner_id.to_string(), board_id, url.to_string()))
            .cloned())
    }

    async fn upsert_post(&self, owner_id: &str, post: &Post) -> Result<Upsert, LmsError> {
        let mut tables = self.lock()?;
        Ok(upsert_row(
            &mut tables.posts,
            (owner_id.to_string(), post.board_id, post.url.clone()),
            post,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_reports_insert_update_unchanged() {
        let store = MemoryStore::new();
        let course = Course {
            id: 1,
            name: "Algorithms".into(),
            is_active: true,
        };
        assert_eq!(store.upsert_course("owner", &course).await.unwrap(), Upsert::Inserted);
        assert_eq!(store.upsert_course("owner", &course).await.unwrap(), Upsert::Unchanged);

        let renamed = Course {
            name: "Algorithms II".into(),
            ..course
        };
        assert_eq!(store.upsert_course("owner", &renamed).await.unwrap(), Upsert::Updated);
        assert_eq!(
            store.find_course("owner", 1).await.unwrap().unwrap().name,
            "Algorithms II"
        );
    }

    #[tokio::test]
    async fn rows_are_scoped_per_owner() {
        let store = MemoryStore::new();
        let course = Course {
            id: 7,
            name: "Networks".into(),
            is_active: true,
        };
        store.upsert_course("alice", &course).await.unwrap();
        assert!(store.find_course("bob", 7).await.unwrap().is_none());
        assert_eq!(store.list_courses("alice").await.unwrap().len(), 1);
        assert!(store.list_courses("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn posts_are_keyed_by_url() {
        let store = MemoryStore::new();
        let post = Post {
            board_id: 3,
            url: "https://lms/article.php?bwid=1".into(),
            title: "Notice".into(),
            writer: "Prof".into(),
            date: "2025-09-18".into(),
            content: None,
        };
        let twin = Post {
            url: "https://lms/article.php?bwid=2".into(),
            ..post.clone()
        };
        store.upsert_post("owner", &post).await.unwrap();
        store.upsert_post("owner", &twin).await.unwrap();
        assert!(store.find_post("owner", 3, &post.url).await.unwrap().is_some());
        assert!(store.find_post("owner", 3, &twin.url).await.unwrap().is_some());
    }
}
