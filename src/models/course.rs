use serde::{Deserialize, Serialize};

/// One enrolled course, scoped to an owner by the store.
///
/// Identity: (external course id, owner). Inactive courses are kept but
/// skipped by whole-account sync passes and dashboard views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

impl Course {
    /// Placeholder row for a course first seen through a direct sync,
    /// before the enrolled-course list has supplied its display name.
    pub fn placeholder(id: i64) -> Self {
        Self {
            id,
            name: format!("Course {id}"),
            is_active: true,
        }
    }
}
