pub mod cache;
pub mod cli;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod playback;
pub mod queue;
pub mod resolver;
pub mod service;
pub mod settings;
pub mod startup;
