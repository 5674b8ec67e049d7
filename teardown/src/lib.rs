//! Teardown engine invoked by the installer while installing, upgrading or
//! uninstalling the tunnelmgr agent and its GUI.
//!
//! The installer engine hands each action a small key-value context; this
//! crate abstracts it as a [`context::TargetSpec`] and performs the heavy
//! lifting: locating every running instance of the target binary by
//! filesystem identity, decommissioning matching services, and reclaiming
//! files and directories that may still be locked.

pub mod cli;
pub mod context;
pub mod decommission;
pub mod identity;
pub mod instrumentation;
pub mod locale;
pub mod migrate;
pub mod process;
pub mod service;
pub mod sweep;
pub mod utils;
