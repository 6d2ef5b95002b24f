#![deny(dead_code)]
#![deny(unused_imports)]

pub mod config;
pub mod data;
pub mod diagnostics;
pub mod estimate;
pub mod evaluate;
pub mod features;
pub mod irls;
pub mod model;
pub mod pipeline;
pub mod prior;
pub mod report;
pub mod sampler;
pub mod split;
pub mod test_fixtures;
