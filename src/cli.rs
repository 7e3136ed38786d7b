//! Clap adapter for livefig.
//!
//! Compiled only when the `clap` Cargo feature is enabled (on by default).
//! [`OptionsArgs`] and [`OptionsSubcommand`] embed into an application's own
//! `#[derive(Parser)]` to give it `options list|get|set|delete|patch` subcommands.
//!
//! Paths on the command line may use `/` or `:` as separator
//! (`db/port` and `db:port` are the same key). [`OptionsArgs::into_action()`]
//! normalizes them into an [`OptionsAction`](crate::OptionsAction), which
//! [`OptionsHost::handle()`](crate::OptionsHost::handle) executes.

use clap::{Args, Subcommand};

use crate::path;
use crate::types::OptionsAction;

/// Clap-derived args for the `options` subcommand group.
///
/// ```ignore
/// #[derive(Parser)]
/// struct Cli {
///     #[command(subcommand)]
///     command: Commands,
/// }
///
/// #[derive(Subcommand)]
/// enum Commands {
///     Options(OptionsArgs),
/// }
/// ```
#[derive(Debug, Args)]
pub struct OptionsArgs {
    #[command(subcommand)]
    pub action: Option<OptionsSubcommand>,
}

#[derive(Debug, Subcommand)]
pub enum OptionsSubcommand {
    /// Show stored key-value pairs, optionally under one section.
    List {
        /// Section path (e.g. "db" or "db/servers").
        section: Option<String>,
    },
    /// Show the value stored at a key.
    Get {
        /// Key path (e.g. "db/port").
        path: String,
    },
    /// Store a value at a key.
    Set {
        /// Key path (e.g. "db/port").
        path: String,
        /// Value to store.
        value: String,
    },
    /// Remove a section and everything beneath it.
    Delete {
        /// Section path (e.g. "db").
        section: String,
    },
    /// Merge a JSON object into a typed section.
    Patch {
        /// Options type name, as registered with `patchable`.
        type_name: String,
        /// Section path (e.g. "db").
        section: String,
        /// JSON merge patch; `null` resets a field to its default.
        json: String,
    },
}

impl OptionsArgs {
    /// Convert clap-parsed args into a framework-agnostic `OptionsAction`.
    ///
    /// Bare `options` (no subcommand) lists everything.
    pub fn into_action(self) -> OptionsAction {
        match self.action {
            None => OptionsAction::List { section: None },
            Some(OptionsSubcommand::List { section }) => OptionsAction::List {
                section: section.as_deref().map(path::normalize),
            },
            Some(OptionsSubcommand::Get { path }) => OptionsAction::Get {
                path: path::normalize(&path),
            },
            Some(OptionsSubcommand::Set { path, value }) => OptionsAction::Set {
                path: path::normalize(&path),
                value,
            },
            Some(OptionsSubcommand::Delete { section }) => OptionsAction::Delete {
                section: path::normalize(&section),
            },
            Some(OptionsSubcommand::Patch {
                type_name,
                section,
                json,
            }) => OptionsAction::Patch {
                type_name,
                section: path::normalize(&section),
                patch: json,
            },
        }
    }
}
