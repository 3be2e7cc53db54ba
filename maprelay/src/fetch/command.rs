//! Commands posted from the coordinator to the host loop.

use crate::resource::Resource;
use std::fmt;

/// Identifies one fetch episode of a resource.
///
/// A new episode starts each time the first waiter for a resource arrives.
/// Completions carry their ticket so that a late answer for a cancelled
/// episode cannot be mistaken for the answer to a newer one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    resource: Resource,
    episode: u64,
}

impl FetchTicket {
    pub(crate) fn new(resource: Resource, episode: u64) -> Self {
        Self { resource, episode }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn episode(&self) -> u64 {
        self.episode
    }
}

impl fmt::Display for FetchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.resource.url(), self.episode)
    }
}

/// Action for the fetch executor on the host loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCommand {
    /// First waiter arrived; begin fetching.
    Start(FetchTicket),
    /// Last waiter left before completion; abandon the fetch.
    Cancel(FetchTicket),
}

impl FetchCommand {
    pub fn ticket(&self) -> &FetchTicket {
        match self {
            FetchCommand::Start(ticket) | FetchCommand::Cancel(ticket) => ticket,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, FetchCommand::Start(_))
    }
}
