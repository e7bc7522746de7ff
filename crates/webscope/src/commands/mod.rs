pub mod fetch;
pub mod image;
pub mod mcp;
pub mod serve;
