pub mod queries;
pub mod requests;
