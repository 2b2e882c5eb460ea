pub mod article;
pub mod category;
pub mod postgres_repository;
pub mod settings;
pub mod user_role;
