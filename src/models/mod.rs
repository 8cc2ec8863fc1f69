pub mod dialect;
pub mod profile;
