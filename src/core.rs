pub mod actuator;
pub mod controller;
pub mod debounce;
pub mod engine;
pub mod mode;
pub mod reader;
pub mod report;
pub mod session;
pub mod snapshot;
pub mod status;
pub mod watch;
