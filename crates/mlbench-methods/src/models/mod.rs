pub mod ann;
pub mod elastic_net;
pub mod estimator;
pub mod factory;
pub mod svm;
pub mod utils;
