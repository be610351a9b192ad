pub mod parser;
pub mod service;

pub use service::Service;
