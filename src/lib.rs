//! # t4c-cli
//!
//! A command-line tool for moving Capella models between a TeamForCapella
//! server and Git.
//!
//! ## Overview
//!
//! `t4c-cli` runs inside a Capella container. The `backup` command imports a
//! TeamForCapella project through the Capella CLI and commits it to a Git
//! repository, replaying the TeamForCapella commit history as Git commits.
//! The `export` command goes the other way and pushes a model from Git (or the
//! local filesystem) into a TeamForCapella repository.
//!
//! ## Architecture
//!
//! - Configuration from environment variables ([`config`])
//! - Capella CLI invocation and output checks ([`capella`])
//! - Exported files on disk ([`workspace`], [`history`])
//! - Git operations ([`scm`])
//! - The two workflows ([`backup`], [`export`])
//! - Logging and command line handlers ([`logger`], [`handlers`])

pub mod backup;
pub mod capella;

/// Environment based configuration, read once at startup.
pub mod config;

pub mod error;
pub mod export;
pub mod handlers;

/// TeamForCapella commit history parsing.
pub mod history;

pub mod logger;
pub mod scm;
pub mod workspace;
