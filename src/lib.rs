pub mod collisions;
pub mod config;
pub mod costs;
pub mod dataset;
pub mod error;
pub mod mode;
pub mod output;
pub mod record;
pub mod tables;
