pub mod jobs;
pub mod notifier;
pub mod scheduler;
