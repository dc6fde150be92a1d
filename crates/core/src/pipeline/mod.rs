pub mod enroll_student_use_case;
pub mod infrastructure;
pub mod job_logger;
pub mod process_video_use_case;
pub mod processing_stats;
pub mod register_teacher_use_case;
pub mod remove_student_use_case;
pub mod scan_executor;
pub mod submit_video_use_case;
