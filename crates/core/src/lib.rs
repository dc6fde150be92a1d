pub mod attendance;
pub mod jobs;
pub mod pipeline;
pub mod recognition;
pub mod sampling;
pub mod shared;
pub mod video;

#[cfg(test)]
mod test_support;
