pub mod retry;
pub mod http;
pub mod oracle;
pub mod chunker;
pub mod timestamp;
pub mod response;
pub mod extract;
pub mod aggregate;
pub mod consolidate;
pub mod render;
pub mod blocks;
pub mod slack;
pub mod summarize;
pub mod config;
pub mod output;
