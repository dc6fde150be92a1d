pub mod threaded_job_dispatcher;
pub mod threaded_scan_executor;
