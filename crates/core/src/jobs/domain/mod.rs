pub mod media_store;
pub mod record_store;
pub mod store_error;
pub mod student;
pub mod video_job;
