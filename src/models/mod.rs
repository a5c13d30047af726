pub mod activity;
pub mod course;

pub use activity::{Assignment, Board, FileResource, Post, VideoLecture};
pub use course::Course;
