//! IFCB Dashboard Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Dataset`, `DataDirectory`, `Bin`, permanent identifiers
//! - **Task model** - `TaskState`, `TaskStatus`, `SyncState`, `SyncReport`
//! - **Port definitions** - Traits for adapters: `IDatasetStore`, `ISharedCache`, `ITaskRuntime`
//! - **Configuration** - YAML-backed settings shared by every binary
//!
//! # Architecture
//!
//! The domain module contains pure data types and rules with no I/O.
//! Ports define the trait interfaces that adapter crates implement
//! (`ifcbdb-store` for persistence, `ifcbdb-sync` for the in-process
//! cache and task runtime). Nothing in this crate reaches for a global:
//! every collaborator is injected through a port.

pub mod config;
pub mod domain;
pub mod ports;
