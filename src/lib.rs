#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod derived;
mod error;
pub mod fit;
pub mod plot;
pub mod report;

pub use error::Error;

pub type Result<T> = ::std::result::Result<T, Error>;
