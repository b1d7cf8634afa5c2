pub mod coach;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod goals;
pub mod health;
pub mod metrics;
pub mod session;
pub mod youtube_api;

#[cfg(test)]
mod test_support;
