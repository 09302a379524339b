pub mod custom_dataset;
pub mod dataset;
pub mod histogram;
pub mod logger;
pub mod metagraph;
pub mod mnist_dataset;
pub mod prepare;
pub mod run;
pub mod session;
pub mod telemetry;
