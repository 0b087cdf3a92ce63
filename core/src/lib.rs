pub mod auth;
pub mod backend;
pub mod chart;
pub mod db;
pub mod error;
pub mod models;
pub mod notice;
pub mod profile;
pub mod session;
pub mod week_plan;
pub mod weight;
pub mod workout;

#[cfg(test)]
pub(crate) mod testing;
