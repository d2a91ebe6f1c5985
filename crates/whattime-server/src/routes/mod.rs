pub mod actions;
pub mod description;
pub mod ping;
