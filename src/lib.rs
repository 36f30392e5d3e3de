pub mod cli;
pub mod codec;
pub mod codegen;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod ir;
pub mod manifest;
pub mod method;
pub mod path_de;
pub mod table;

pub use codegen::generate;
pub use config::GenOptions;
pub use error::GenError;
pub use manifest::Manifest;
pub use method::{Registry, Signature};
