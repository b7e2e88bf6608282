//! Relay layer between host-side wrapper values and a handle-based geometry
//! engine.
//!
//! Layout
//! - `engine`: the handle-based engine boundary and the in-memory reference
//!   engine.
//! - `session`, `bridge`: one session per unit of work; sentinel and
//!   error-callback checking after every engine call.
//! - `relay`: exactly-once ownership of one engine handle per wrapper.
//! - `geometry`, `decompose`, `params`, `codec`, `ops`: the wrapper surface.
//!
//! API Policy
//! - Raw handles never leave the relay layer except through [`Wrapper::raw`]
//!   for the duration of one engine call.
//! - Everything is single-threaded per session; sessions and wrappers are
//!   `!Send` by construction.

mod bridge;
pub mod codec;
pub mod decompose;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod ops;
pub mod params;
pub mod relay;
pub mod session;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use codec::{ByteOrder, GeometrySeed, WkbReader, WkbWriter, WktReader};
pub use engine::memory::MemoryEngine;
pub use engine::{Engine, RawHandle};
pub use error::{RelayError, Result};
pub use geometry::{Geometry, GeometryType};
pub use params::{BufferStyle, CapStyle, JoinStyle, StyleValue};
pub use relay::{BoundState, ResourceKind, Wrapper};
pub use session::{CodecCfg, Session, SessionCfg};

/// Common exports for callers and tests.
pub mod prelude {
    pub use crate::codec::{ByteOrder, GeometrySeed, WkbReader, WkbWriter, WktReader};
    pub use crate::error::{RelayError, Result};
    pub use crate::geometry::{Geometry, GeometryType};
    pub use crate::ops::{engine_version, line_merge, polygonize, relate_match, shared_paths, Polygonized};
    pub use crate::params::{BufferStyle, CapStyle, JoinStyle, StyleValue};
    pub use crate::relay::{ResourceKind, Wrapper};
    pub use crate::session::{CodecCfg, Session, SessionCfg};
}
