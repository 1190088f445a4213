//! # Convergent Testkit
//!
//! Testing utilities for Convergent.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: pinned canonical encodings for cross-device
//!   verification
//! - **Generators**: proptest strategies over configuration trees
//! - **Fixtures**: multi-device setups sharing a namespace key
//!
//! ## Golden Vectors
//!
//! ```rust
//! use convergent_testkit::vectors::all_vectors;
//! use convergent_core::canonical;
//!
//! for vector in all_vectors() {
//!     assert_eq!(canonical::encode(&vector.value), vector.expected);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use convergent_testkit::generators;
//!
//! proptest! {
//!     #[test]
//!     fn roundtrip(v in generators::value()) {
//!         let bytes = convergent_core::canonical::encode(&v);
//!         prop_assert_eq!(convergent_core::canonical::decode(&bytes).unwrap(), v);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use convergent_testkit::fixtures::multi_device_fixtures;
//!
//! let devices = multi_device_fixtures(3, [0x42; 32]);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{dict, init_tracing, multi_device_fixtures, DeviceFixture};
pub use vectors::{all_vectors, GoldenVector};
