#![deny(rustdoc::broken_intra_doc_links)]
//! A Rust & [zbus](https://gitlab.freedesktop.org/dbus/zbus) client for
//! [GameMode](https://github.com/FeralInteractive/gamemode), the daemon
//! that puts the system into a performance mode while games are running.
//!
//! Requests reach GameMode either directly over the session bus, or, from
//! inside a Flatpak sandbox, through the `org.freedesktop.portal.GameMode`
//! portal. The transport is selected once per process from the sandbox
//! status; see [`select_transport`].
//!
//! # Examples
//!
//! Register the current process for as long as the game runs
//! ```rust,no_run
//! use gamemode_client::{GameMode, Method, Status};
//!
//! fn run() -> gamemode_client::Result<()> {
//!     let gamemode = GameMode::new();
//!     match gamemode.try_request(Method::RegisterGame, 0)? {
//!         Status::Accepted => println!("GameMode is on"),
//!         status => println!("GameMode refused: {status:?}"),
//!     }
//!
//!     // play
//!
//!     gamemode.end();
//!     Ok(())
//! }
//! ```
//!
//! Use an installed `libgamemode.so` if there is one
//! ```rust,no_run
//! use gamemode_client::GameMode;
//!
//! let gamemode = GameMode::dynamic();
//! if gamemode.start() < 0 {
//!     eprintln!("{}", gamemode.last_error());
//! }
//! ```
//!
//! # Optional features
//!
//! | Feature | Description |
//! | ---     | ----------- |
//! | async-io | Use zbus' async-io backend (default) |
//! | tracing | Log requests and their results with [`tracing`](https://docs.rs/tracing) (default) |
//! | capi | Export the `real_gamemode_*` C functions, so the cdylib can be installed as `libgamemode.so` |

/// Alias for a [`Result`] with the error type `gamemode_client::Error`.
pub type Result<T> = std::result::Result<T, Error>;

mod backend;
pub use self::backend::{Backend, Unavailable};
mod binding;
pub use self::binding::{
    ensure_binding, symbol_name, Binding, Need, SymbolSource, LIBRARY_NAME, LIBRARY_SONAME,
    SYMBOL_PREFIX,
};
mod body;
#[cfg(feature = "capi")]
#[cfg_attr(docsrs, doc(cfg(feature = "capi")))]
pub mod capi;
mod error;
pub use self::error::Error;
mod game_mode;
pub use self::game_mode::{Builder, GameMode, TRANSPORT_FAILURE};
mod native;
pub use self::native::{request_native, NativeClient};
pub mod portal;
pub use self::portal::{request_portal, PortalClient, PortalExchange};
mod proxy;
mod request;
pub use self::request::{Method, Request, Status};
mod sandbox;
pub use self::sandbox::{is_sandboxed, select_transport, SandboxProbe, TransportMode, FLATPAK_INFO};
pub use zbus;
