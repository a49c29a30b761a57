pub mod config;
pub mod interview;
mod multipart;

pub use self::config::get_config;
pub use self::interview::configure_interview_routes;
