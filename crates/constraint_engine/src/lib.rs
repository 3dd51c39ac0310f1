// SPDX-License-Identifier: Apache-2.0

//! The driver capability (C4) and its reference `regorus`-backed
//! implementation, with a transactional per-target inventory store (part
//! of C8's concurrency discipline).

pub mod driver;
pub mod error;
pub mod storage;
pub mod violation;

pub use driver::{Driver, QueryOutcome, RegorusDriver};
pub use error::Error;
pub use storage::InventoryStore;
pub use violation::{AttributedViolation, Violation};
