pub mod board;
pub mod config;
pub mod data;
pub mod replay;
