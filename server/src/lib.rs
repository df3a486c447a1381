pub mod achievements;
pub mod db;
pub mod error;
