pub mod collections;
pub mod group;
pub mod metric;
pub mod time;
