//! Hardware-independent core library for baro-node
//!
//! This crate contains all platform-agnostic logic of the barometric
//! measurement node: the two-wire bus transaction engine and its controllers,
//! bus sharing, the BMP085 driver with its compensation pipeline, and the
//! sampling loop helper.
//!
//! It is `#![no_std]` so it compiles on both embedded targets (ESP32-S3) and
//! desktop hosts, where the tests run against a simulated bus controller.

#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod config;
pub mod sampling;
pub mod sensors;
pub mod shared_bus;
