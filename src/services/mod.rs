pub mod attempt_service;
pub mod grading_service;
pub mod response_recorder;
pub mod stats_service;
pub mod timer;
