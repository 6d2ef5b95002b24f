#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

// Logistic-regression case study
#[path = "../logit/mod.rs"]
pub mod logit;
