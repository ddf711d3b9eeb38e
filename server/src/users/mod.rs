pub mod accounts;
pub mod profile;
