mod api;
mod files;

pub use api::*;
pub use files::*;
