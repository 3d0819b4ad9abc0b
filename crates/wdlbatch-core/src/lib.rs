pub mod config;
pub mod constants;
pub mod errors;
pub mod labels;
pub mod logging;
pub mod model;
pub mod samplesheet;
pub mod template;
