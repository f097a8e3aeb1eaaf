pub mod cli;
pub mod common;
pub mod db;
pub mod network;
pub mod nostr_client;
pub mod probes;
pub mod service;
pub mod services;
