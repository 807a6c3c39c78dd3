pub mod easee;
pub mod heartbeat;
pub mod home_assistant;
