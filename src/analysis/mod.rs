pub mod cluster;
pub mod recommend;
pub mod strings;
pub mod structure;
