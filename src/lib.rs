pub mod accounting;
pub mod clock;
pub mod config;
pub mod graph;
pub mod metric;
pub mod report;
pub mod scale;
pub mod series;
pub mod tool;
