// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! # spikegrid NPU events
//!
//! Synaptic event delivery for a partitioned spiking network.
//!
//! This crate provides:
//! - **[`DelayRingEventQueue`]**: one bit-packed delay ring per cluster, O(1) schedule/consume
//! - **[`ClusterEventRouter`]**: local delivery or staged relay to foreign clusters
//! - **[`EventHandler`]**: the symmetric capability every cluster exposes to the others
//! - **[`DeviceMirror`]**: explicit transfers for clusters living in another memory domain
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use spikegrid_npu_events::*;
//!
//! let inbox = Arc::new(ClusterInbox::new(ClusterId(0), 16));
//! let directory = Arc::new(ClusterDirectory::from_inboxes([inbox.clone()]));
//! let mut queue = DelayRingEventQueue::new(128, 16).unwrap();
//! let mut router = ClusterEventRouter::new(ClusterId(0), 16, inbox, directory, Box::new(HostMirror));
//!
//! router.add_an_event(&mut queue, 5, ClusterId(0)).unwrap();
//! assert!(queue.consume_at_current(5).unwrap());
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod delay_queue;
pub mod error;
pub mod handler;
pub mod ids;
pub mod mirror;
pub mod router;

pub use delay_queue::{DelayRingEventQueue, QueueWord, MAX_DELAY_HORIZON};
pub use error::{EventQueueError, Result, StagingBuffer};
pub use handler::{ClusterDirectory, ClusterInbox, EventHandler};
pub use ids::{ClusterId, CrossClusterEventRecord};
pub use mirror::{mirror_for, DeviceMirror, HostMirror, MemoryDomain, PackedDeviceMirror};
pub use router::ClusterEventRouter;
