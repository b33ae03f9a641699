pub mod compression;
pub mod traits;
