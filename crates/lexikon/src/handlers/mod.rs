pub mod annotations;
pub mod entries;
mod error;
pub mod examples;
pub mod health;
pub mod history;
pub mod meanings;
pub mod translations;

pub use error::AppError;
