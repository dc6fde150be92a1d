pub mod fs_media_store;
pub mod http_media_store;
pub mod in_memory_media_store;
pub mod in_memory_record_store;
pub mod json_record_store;
mod record_state;
