pub mod admin;
pub mod error;
pub mod health;
pub mod pages;
pub mod twitch;
