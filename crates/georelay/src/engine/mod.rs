//! Handle-based geometry engine boundary.
//!
//! Purpose
//! - Describe the native engine the relay layer drives, in the shape of its C
//!   API: opaque handles, explicit per-kind destructors, sentinel returns, and
//!   two out-of-band message callbacks (notice, error).
//! - Keep the boundary object-safe so a session can own any engine as
//!   `Rc<dyn Engine>` (an FFI engine or the in-memory reference engine).
//!
//! Conventions
//! - Handles returned by constructors, readers, `geom_clone`, `point_n`,
//!   `start_point`, `end_point`, `envelope`, `buffer_with_params`,
//!   `line_merge`, `shared_paths` and `polygonize_full` are OWNED by the
//!   caller and must be released through the matching `*_destroy`.
//! - Handles returned by `geometry_n`, `interior_ring_n` and `exterior_ring`
//!   are BORROWED from their parent and become invalid once the parent is
//!   destroyed. They must be cloned before they outlive the parent.
//! - Failure sentinels: `None` for handles/values, `-1` for counts and ids,
//!   [`PRED_UNKNOWN`] for predicates, [`STATUS_FAIL`] for setters.
//! - The error callback fires synchronously, before the failing call returns.
//!   The relay layer depends on this ordering to attach messages to failures.

use std::fmt;
use std::num::NonZeroU64;

pub mod memory;

/// Opaque engine resource token. Copying it never copies the resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(NonZeroU64);

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Receives one formatted engine message.
pub type MessageHandler = Box<dyn Fn(&str)>;

pub const PRED_FALSE: i8 = 0;
pub const PRED_TRUE: i8 = 1;
/// The engine raised an error before it could decide.
pub const PRED_UNKNOWN: i8 = 2;

pub const STATUS_FAIL: i32 = 0;
pub const STATUS_OK: i32 = 1;

pub const CAP_ROUND: i32 = 1;
pub const CAP_FLAT: i32 = 2;
pub const CAP_SQUARE: i32 = 3;

pub const JOIN_ROUND: i32 = 1;
pub const JOIN_MITRE: i32 = 2;
pub const JOIN_BEVEL: i32 = 3;

pub const BYTE_ORDER_BIG: i32 = 0;
pub const BYTE_ORDER_LITTLE: i32 = 1;

/// Decoded predicate return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriState {
    False,
    True,
    /// Anything other than 0/1; an error is pending on the session.
    Unknown,
}

impl TriState {
    #[inline]
    pub fn from_raw(raw: i8) -> Self {
        match raw {
            PRED_FALSE => TriState::False,
            PRED_TRUE => TriState::True,
            _ => TriState::Unknown,
        }
    }
}

/// The four owned result collections of a full polygonization.
#[derive(Clone, Copy, Debug)]
pub struct PolygonizeOutput {
    pub rings: RawHandle,
    pub cut_edges: RawHandle,
    pub dangles: RawHandle,
    pub invalid_rings: RawHandle,
}

/// Handle-based engine API consumed by the relay layer.
pub trait Engine {
    fn version(&self) -> String;

    /// Install the callbacks for one unit of work. Returns [`STATUS_FAIL`]
    /// without touching the installed pair if one is already present.
    fn set_handlers(&self, notice: MessageHandler, error: MessageHandler) -> i32;
    /// Drop the callbacks and release engine-global state.
    fn clear_handlers(&self);

    // -- geometry lifecycle and metadata --
    fn geom_clone(&self, g: RawHandle) -> Option<RawHandle>;
    fn geom_destroy(&self, g: RawHandle);
    fn geom_type_id(&self, g: RawHandle) -> i32;
    fn geom_type(&self, g: RawHandle) -> Option<String>;
    fn get_srid(&self, g: RawHandle) -> Option<i32>;
    fn set_srid(&self, g: RawHandle, srid: i32) -> i32;

    // -- predicates (0 / 1 / PRED_UNKNOWN) --
    fn is_empty(&self, g: RawHandle) -> i8;
    fn has_z(&self, g: RawHandle) -> i8;
    fn is_closed(&self, g: RawHandle) -> i8;
    fn is_ring(&self, g: RawHandle) -> i8;
    fn equals_exact(&self, a: RawHandle, b: RawHandle, tolerance: f64) -> i8;
    fn relate_pattern_match(&self, matrix: &str, pattern: &str) -> i8;

    // -- decomposition (borrowed children) --
    fn num_geometries(&self, g: RawHandle) -> i32;
    fn geometry_n(&self, g: RawHandle, n: i32) -> Option<RawHandle>;
    fn num_interior_rings(&self, g: RawHandle) -> i32;
    fn interior_ring_n(&self, g: RawHandle, n: i32) -> Option<RawHandle>;
    fn exterior_ring(&self, g: RawHandle) -> Option<RawHandle>;

    // -- point sequences (owned results) --
    fn num_points(&self, g: RawHandle) -> i32;
    fn point_n(&self, g: RawHandle, n: i32) -> Option<RawHandle>;
    fn start_point(&self, g: RawHandle) -> Option<RawHandle>;
    fn end_point(&self, g: RawHandle) -> Option<RawHandle>;
    fn get_x(&self, g: RawHandle) -> Option<f64>;
    fn get_y(&self, g: RawHandle) -> Option<f64>;
    fn num_coordinates(&self, g: RawHandle) -> i32;
    fn dimension(&self, g: RawHandle) -> i32;
    fn coordinate_dimension(&self, g: RawHandle) -> i32;

    // -- measures and constructive operations --
    fn area(&self, g: RawHandle) -> Option<f64>;
    fn length(&self, g: RawHandle) -> Option<f64>;
    fn envelope(&self, g: RawHandle) -> Option<RawHandle>;

    fn buffer_params_create(&self) -> Option<RawHandle>;
    fn buffer_params_destroy(&self, p: RawHandle);
    fn buffer_params_set_quadrant_segments(&self, p: RawHandle, segments: i32) -> i32;
    fn buffer_params_set_end_cap_style(&self, p: RawHandle, style: i32) -> i32;
    fn buffer_params_set_join_style(&self, p: RawHandle, style: i32) -> i32;
    fn buffer_params_set_mitre_limit(&self, p: RawHandle, limit: f64) -> i32;
    fn buffer_params_set_single_sided(&self, p: RawHandle, single_sided: bool) -> i32;
    fn buffer_with_params(&self, g: RawHandle, p: RawHandle, width: f64) -> Option<RawHandle>;

    fn polygonize_full(&self, g: RawHandle) -> Option<PolygonizeOutput>;
    fn line_merge(&self, g: RawHandle) -> Option<RawHandle>;
    fn shared_paths(&self, a: RawHandle, b: RawHandle) -> Option<RawHandle>;

    // -- text codec --
    fn wkt_reader_create(&self) -> Option<RawHandle>;
    fn wkt_reader_destroy(&self, r: RawHandle);
    fn wkt_reader_read(&self, r: RawHandle, wkt: &str) -> Option<RawHandle>;
    /// Trimmed well-known text.
    fn wkt_write(&self, g: RawHandle) -> Option<String>;

    // -- binary codec --
    fn wkb_writer_create(&self) -> Option<RawHandle>;
    fn wkb_writer_destroy(&self, w: RawHandle);
    fn wkb_writer_get_output_dimension(&self, w: RawHandle) -> i32;
    fn wkb_writer_set_output_dimension(&self, w: RawHandle, dimension: i32) -> i32;
    fn wkb_writer_get_byte_order(&self, w: RawHandle) -> i32;
    fn wkb_writer_set_byte_order(&self, w: RawHandle, order: i32) -> i32;
    fn wkb_writer_get_include_srid(&self, w: RawHandle) -> i8;
    fn wkb_writer_set_include_srid(&self, w: RawHandle, include: bool) -> i32;
    fn wkb_writer_write(&self, w: RawHandle, g: RawHandle) -> Option<Vec<u8>>;
    fn wkb_writer_write_hex(&self, w: RawHandle, g: RawHandle) -> Option<String>;

    fn wkb_reader_create(&self) -> Option<RawHandle>;
    fn wkb_reader_destroy(&self, r: RawHandle);
    fn wkb_reader_read(&self, r: RawHandle, wkb: &[u8]) -> Option<RawHandle>;
    fn wkb_reader_read_hex(&self, r: RawHandle, hex: &[u8]) -> Option<RawHandle>;
}
