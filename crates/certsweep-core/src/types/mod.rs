mod config;
mod harvest;
mod record;

pub use config::*;
pub use harvest::*;
pub use record::*;
