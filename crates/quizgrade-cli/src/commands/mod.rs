pub mod init;
pub mod list_models;
pub mod quiz;
pub mod scores;
pub mod validate;
