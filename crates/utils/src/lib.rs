pub mod assets;
pub mod jwt;
pub mod logging;
pub mod response;
pub mod sentry;
