pub mod config;
pub mod controller;
pub mod error;
pub mod features;
pub mod gestures;
pub mod landmarks;
pub mod logging;
pub mod photos;
pub mod presenter;
pub mod scene;
pub mod session;
pub mod tracker;
