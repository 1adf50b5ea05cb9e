pub mod attributes;
pub mod cache;
pub mod config;
pub mod describe;
pub mod health;
pub mod history;
pub mod origin;
pub mod recommend;
