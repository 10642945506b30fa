//! Application layer: requests, tailoring and the export pipelines.

pub mod export;
pub mod maintenance;
pub mod request;
pub mod script;
pub mod tailor;
