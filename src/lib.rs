pub mod balance;
pub mod cast;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod identifier;
pub mod mapping;
pub mod normalize;
pub mod program;
pub mod reproject;
pub mod row;
pub mod scheduler;
pub mod schema;
pub mod scratch;
