pub mod archive;
pub mod extract;
pub mod pipeline;
pub mod process;
pub mod regenerate;
pub mod resolve;
pub mod scan;
