mod access;
mod files;
mod job;

pub use access::*;
pub use files::*;
pub use job::*;
