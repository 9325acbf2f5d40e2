pub mod config;
pub mod geometry;
pub mod join;
pub mod keys;
pub mod output;
pub mod pipeline;
pub mod ranges;
pub mod split;
pub mod tables;
