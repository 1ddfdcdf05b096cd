//! # ddfem
//!
//! Domain-decomposed finite-element analysis with an actor/shadow split.
//!
//! A model is cut into partitions. Each partition lives in a worker-side
//! [`Actor`] that owns a [`Subdomain`]; the coordinator drives it through a
//! [`Shadow`] that forwards every call over a [`Channel`](ddfem_core::Channel).
//! Both implement [`SubdomainHandle`], so analysis code does not care whether
//! a partition is local or remote.
//!
//! ## Crate Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ddfem (this crate)                       │
//! │  coordinator: Shadow, ShadowGroup, barrier                   │
//! │  worker:      Actor, ObjectBroker/Registry                   │
//! │  model:       Partition, Subdomain, DofMap, AnalysisEngine   │
//! ├───────────────────────────────┬──────────────────────────────┤
//! │  ddfem-transport              │  ddfem-core                  │
//! │  • MemoryChannel (in-process) │  • Opcode + reply shapes     │
//! │  • TcpChannel + wire format   │  • Header, Frame, Channel    │
//! │                               │  • MovableObject, codecs     │
//! └───────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::rc::Rc;
//! use ddfem::{Actor, ActorConfig, Registry, Shadow, SubdomainHandle};
//! use ddfem::model::Node;
//! use ddfem_transport::MemoryChannel;
//!
//! let (coordinator, worker) = MemoryChannel::pair();
//! let registry = Rc::new(Registry::new());
//! tokio::task::spawn_local(Actor::new(worker, registry.clone(), ActorConfig::new("p1")).run());
//!
//! let mut shadow = Shadow::new(coordinator, 1, registry).await?;
//! shadow.add_node(Node::new(1, 3, vec![0.0, 0.0, 0.0])).await?;
//! shadow.terminate().await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod actor;
mod analysis;
mod barrier;
mod broker;
mod config;
mod dof_map;
mod error;
mod group;
mod handle;
mod partition;
mod shadow;
mod subdomain;

/// Tracing subscriber setup.
pub mod logging;

/// Components a partition is made of.
pub mod model;

pub use actor::{Actor, ActorState};
pub use analysis::{AnalysisComponent, AnalysisEngine, AnalysisError, ComponentKind};
pub use barrier::combine_statuses;
pub use broker::{ObjectBroker, Registry};
pub use config::ActorConfig;
pub use dof_map::DofMap;
pub use error::{DomainError, DomainResult};
pub use group::ShadowGroup;
pub use handle::SubdomainHandle;
pub use partition::Partition;
pub use shadow::{BoundaryData, Shadow, ShadowCounts};
pub use subdomain::Subdomain;

pub use ddfem_core;
pub use ddfem_transport;
