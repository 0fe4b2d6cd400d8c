pub mod encoder;
pub mod job_worker;
pub mod upload;
