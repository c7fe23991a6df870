//! This crate trains a Deep Q-Network agent to shake a simulated container
//! until objects of two colors are spread evenly over its four quadrants.
//! It includes the state encoder, the replay buffer, the Q-networks, the
//! training loop, and the binding to the remote physics simulator.

pub mod config;
pub mod coppelia;
pub mod environment;
pub mod error;
pub mod qnetwork;
pub mod replay_buffer;
pub mod state;
pub mod trainer;

pub use error::{MixError, Result};
