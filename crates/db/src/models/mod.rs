pub mod couple;
pub mod credential;
pub mod entry;
pub mod entry_access_log;
pub mod entry_viewer;
pub mod journal_entry;
pub mod mood_entry;
pub mod private_note;
pub mod profile;
pub mod shared_reflection;
