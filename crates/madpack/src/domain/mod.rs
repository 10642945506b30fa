//! Domain types: model files, the definition graph and the error taxonomy.

pub mod definition;
pub mod errors;
pub mod file;
pub mod machine;
pub mod optics;
