pub mod capture;
pub mod client;
pub mod configuration;
pub mod controller;
pub mod error_handling;
pub mod network;
pub mod pcapng;
pub mod targets;
