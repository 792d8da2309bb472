pub mod date_serde;
pub mod db;
pub mod documents;
pub mod inventory;
pub mod models;
pub mod sql;

mod error;

pub use error::{Error, Result};
