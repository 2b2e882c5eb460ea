pub mod article;
pub mod category;
pub mod channel;
pub mod health;
pub mod pages;
pub mod session;
pub mod site_settings;
pub mod user_role;
