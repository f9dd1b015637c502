pub mod audio;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod flow;
pub mod model;
pub mod schema;
pub mod telemetry;
pub mod template;
