//! modsync update engine.
//!
//! This crate finds newer releases of installed plugin packages through
//! pluggable search providers and installs them into a host's directory tree
//! through pluggable install handlers. It is used by the `modsync` CLI binary
//! and can be driven programmatically for testing or custom front ends.
//!
//! # Modules
//!
//! - [`auth`] - GitHub device authorisation
//! - [`catalog`] - Installed-package enumeration
//! - [`cli`] - Command-line argument definitions
//! - [`clock`] - Wall-clock abstraction
//! - [`config`] - `modsync.toml` loading
//! - [`conflict`] - Selection among same-identity install candidates
//! - [`download`] - Release artifact downloads
//! - [`error`] - Top-level error type for the binary
//! - [`extraction`] - Archive extraction with path traversal checks
//! - [`filter`] - Per-package include/exclude patterns
//! - [`handler`] - Install handlers for raw binaries and archives
//! - [`host`] - Host directory layout and identity reading
//! - [`http`] - Registry transport
//! - [`output`] - Human-facing CLI output
//! - [`pipeline`] - Per-run orchestration
//! - [`provider`] - Search providers for remote registries
//! - [`registry`] - Provider and handler registration
//! - [`resolver`] - Per-package update resolution
//! - [`session`] - Run-wide install queue

pub mod auth;
pub mod catalog;
pub mod cli;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod download;
pub mod error;
pub mod extraction;
pub mod filter;
pub mod handler;
pub mod host;
pub mod http;
pub mod output;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod session;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
