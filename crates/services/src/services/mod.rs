pub mod audio;
pub mod auth;
pub mod calendar;
pub mod claude_api;
pub mod database_validator;
pub mod entries;
pub mod invite_code;
pub mod partner;
pub mod reflection;
pub mod reflection_scheduler;
pub mod stats;
