//! maprelay - request coalescing and host-loop plumbing for map rendering
//!
//! A map renderer asks for the same style, tile or glyph range from many
//! places at once. This crate makes sure each distinct resource is fetched
//! at most once at a time, fans the result out to every caller, and moves
//! work between worker threads and the single host loop that owns I/O.
//!
//! # Building blocks
//!
//! - [`runloop`]: the cooperative host loop and its wake handles
//! - [`work_queue`]: thread-safe hand-off of values onto the loop
//! - [`actor`]: mailboxes, schedulers and weak actor references
//! - [`fetch`]: the coalescing coordinator, fetch service and executors
//! - [`resource`]: what is fetched and what comes back
//!
//! # Example
//!
//! ```no_run
//! use maprelay::fetch::{FetchService, RoutingFetcher, HttpFetcherConfig};
//! use maprelay::resource::Resource;
//! use maprelay::runloop::RunLoop;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let run_loop = RunLoop::new();
//! let executor = RoutingFetcher::from_config(
//!     &HttpFetcherConfig::default(),
//!     None,
//!     tokio::runtime::Handle::current(),
//! )?;
//! let service = FetchService::new(&run_loop.handle(), Box::new(executor))?;
//!
//! let handle = service.coordinator().request(
//!     Resource::style("https://example.com/style.json"),
//!     |response| println!("style: {:?}", response.payload().map(|b| b.len())),
//! )?;
//!
//! run_loop.run().await?;
//! drop(handle);
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod fetch;
pub mod log;
pub mod logging;
pub mod resource;
pub mod runloop;
pub mod work_queue;

/// Version of the maprelay library and CLI.
///
/// Defined once in the workspace `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
