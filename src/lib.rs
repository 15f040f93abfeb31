pub mod config;
pub mod error_codes;
pub mod geometry;
pub mod patcher;
pub mod pipeline;
pub mod region_map;
pub mod settings_db;
