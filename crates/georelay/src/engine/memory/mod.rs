//! In-memory reference engine.
//!
//! Purpose
//! - Implement [`Engine`] without a native library so the relay layer can be
//!   exercised end to end (tests, benches, the CLI).
//! - Behave like the C engine where the relay layer can observe it: sentinel
//!   returns, synchronous error callbacks, borrowed children that die with
//!   their parent, and destructors that must be called exactly once.
//!
//! Storage
//! - One slab of slots keyed by [`RawHandle`]. Owned geometries, readers,
//!   writers and buffer parameters each occupy a slot.
//! - A borrowed child is a `View { root, path }` slot. Views are deduplicated
//!   per `(root, path)` and removed together with their root. Destroying a
//!   view directly is refused with a notice.
//! - [`MemoryEngine::live_handles`] / [`MemoryEngine::live_views`] report what
//!   is still allocated, for leak checks. [`MemoryEngine::fail_clones`]
//!   injects clone failures.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::num::NonZeroU64;

use super::{
    Engine, MessageHandler, PolygonizeOutput, RawHandle, CAP_ROUND, CAP_SQUARE, JOIN_BEVEL,
    JOIN_ROUND, PRED_FALSE, PRED_TRUE, PRED_UNKNOWN, STATUS_FAIL, STATUS_OK,
};

mod geom;
mod ops;
mod wkb;
mod wkt;

#[cfg(test)]
mod tests;

use geom::{ChildRef, Geom, Shape};
pub use ops::BufferParamsData;
use wkb::WriterCfg;

const KIND_GEOMETRY: &str = "Geometry";
const KIND_VIEW: &str = "GeometryView";
const KIND_WKT_READER: &str = "WKTReader";
const KIND_WKB_WRITER: &str = "WKBWriter";
const KIND_WKB_READER: &str = "WKBReader";
const KIND_BUFFER_PARAMS: &str = "BufferParams";

enum Slot {
    Geom(Geom),
    View { root: RawHandle, path: Vec<ChildRef> },
    WktReader,
    WkbWriter(WriterCfg),
    WkbReader,
    BufferParams(BufferParamsData),
}

impl Slot {
    fn kind(&self) -> &'static str {
        match self {
            Slot::Geom(_) => KIND_GEOMETRY,
            Slot::View { .. } => KIND_VIEW,
            Slot::WktReader => KIND_WKT_READER,
            Slot::WkbWriter(_) => KIND_WKB_WRITER,
            Slot::WkbReader => KIND_WKB_READER,
            Slot::BufferParams(_) => KIND_BUFFER_PARAMS,
        }
    }
}

#[derive(Default)]
struct State {
    issued: u64,
    slots: HashMap<RawHandle, Slot>,
    views: HashMap<(RawHandle, Vec<ChildRef>), RawHandle>,
}

impl State {
    fn insert(&mut self, slot: Slot) -> RawHandle {
        let h = RawHandle(NonZeroU64::MIN.saturating_add(self.issued));
        self.issued += 1;
        self.slots.insert(h, slot);
        h
    }

    fn insert_geom(&mut self, g: Geom) -> RawHandle {
        self.insert(Slot::Geom(g))
    }

    /// Remove a slot and every view borrowed from it.
    fn remove(&mut self, h: RawHandle) {
        self.slots.remove(&h);
        let slots = &mut self.slots;
        self.views.retain(|(root, _), view| {
            if *root == h {
                slots.remove(view);
                false
            } else {
                true
            }
        });
    }

    fn expect_kind(&self, h: RawHandle, kind: &str) -> Result<&Slot, String> {
        match self.slots.get(&h) {
            Some(slot) if slot.kind() == kind => Ok(slot),
            Some(slot) => Err(format!(
                "IllegalArgumentException: handle {h} is a {}, expected {kind}",
                slot.kind()
            )),
            None => Err(format!("IllegalArgumentException: unknown handle {h}")),
        }
    }

    /// Root handle and child path of a geometry handle (owned or borrowed).
    fn locate(&self, h: RawHandle) -> Result<(RawHandle, Vec<ChildRef>), String> {
        match self.slots.get(&h) {
            Some(Slot::Geom(_)) => Ok((h, Vec::new())),
            Some(Slot::View { root, path }) => Ok((*root, path.clone())),
            Some(slot) => Err(format!(
                "IllegalArgumentException: handle {h} is a {}, expected {KIND_GEOMETRY}",
                slot.kind()
            )),
            None => Err(format!("IllegalArgumentException: unknown geometry handle {h}")),
        }
    }

    fn geom(&self, h: RawHandle) -> Result<&Geom, String> {
        let (root, path) = self.locate(h)?;
        match self.slots.get(&root) {
            Some(Slot::Geom(g)) => g.resolve(&path),
            _ => Err(format!("IllegalArgumentException: dangling geometry handle {h}")),
        }
    }

    fn geom_mut(&mut self, h: RawHandle) -> Result<&mut Geom, String> {
        let (root, path) = self.locate(h)?;
        match self.slots.get_mut(&root) {
            Some(Slot::Geom(g)) => g.resolve_mut(&path),
            _ => Err(format!("IllegalArgumentException: dangling geometry handle {h}")),
        }
    }

    /// Borrowed handle for one child step below `parent`.
    fn view(&mut self, parent: RawHandle, step: ChildRef) -> Result<RawHandle, String> {
        let (root, mut path) = self.locate(parent)?;
        path.push(step);
        if let Some(Slot::Geom(g)) = self.slots.get(&root) {
            g.resolve(&path)?;
        }
        if let Some(&existing) = self.views.get(&(root, path.clone())) {
            return Ok(existing);
        }
        let h = self.insert(Slot::View {
            root,
            path: path.clone(),
        });
        self.views.insert((root, path), h);
        Ok(h)
    }

    fn writer_mut(&mut self, w: RawHandle) -> Result<&mut WriterCfg, String> {
        self.expect_kind(w, KIND_WKB_WRITER)?;
        match self.slots.get_mut(&w) {
            Some(Slot::WkbWriter(cfg)) => Ok(cfg),
            _ => Err(format!("IllegalArgumentException: unknown handle {w}")),
        }
    }

    fn params_mut(&mut self, p: RawHandle) -> Result<&mut BufferParamsData, String> {
        self.expect_kind(p, KIND_BUFFER_PARAMS)?;
        match self.slots.get_mut(&p) {
            Some(Slot::BufferParams(data)) => Ok(data),
            _ => Err(format!("IllegalArgumentException: unknown handle {p}")),
        }
    }
}

struct Handlers {
    notice: MessageHandler,
    error: MessageHandler,
}

/// Single-threaded engine storing geometry values in a handle slab.
#[derive(Default)]
pub struct MemoryEngine {
    state: RefCell<State>,
    handlers: RefCell<Option<Handlers>>,
    clone_faults: Cell<usize>,
}

#[inline]
fn pred(b: bool) -> i8 {
    if b {
        PRED_TRUE
    } else {
        PRED_FALSE
    }
}

#[inline]
fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn index(n: i32) -> Result<usize, String> {
    usize::try_from(n).map_err(|_| "IllegalArgumentException: Index out of range".to_string())
}

fn is_closed_line(cs: &[geom::Coord]) -> bool {
    matches!((cs.first(), cs.last()), (Some(a), Some(b)) if a.same_xy(b))
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Owned resources still allocated (geometries, readers, writers, params).
    pub fn live_handles(&self) -> usize {
        let state = self.state.borrow();
        state.slots.len() - state.views.len()
    }

    /// Borrowed child handles still registered under a live root.
    pub fn live_views(&self) -> usize {
        self.state.borrow().views.len()
    }

    /// Current values of a buffer parameter object, if `p` is one.
    pub fn buffer_params(&self, p: RawHandle) -> Option<BufferParamsData> {
        match self.state.borrow().slots.get(&p) {
            Some(Slot::BufferParams(data)) => Some(*data),
            _ => None,
        }
    }

    /// Make the next `n` calls to `geom_clone` fail with an engine error.
    pub fn fail_clones(&self, n: usize) {
        self.clone_faults.set(n);
    }

    fn raise(&self, message: &str) {
        if let Some(h) = self.handlers.borrow().as_ref() {
            (h.error)(message);
        }
    }

    fn notice(&self, message: &str) {
        if let Some(h) = self.handlers.borrow().as_ref() {
            (h.notice)(message);
        }
    }

    /// Run `f` against the state; on error release the borrow, report the
    /// message through the error callback and return `fail`.
    fn guard<T>(&self, fail: T, f: impl FnOnce(&mut State) -> Result<T, String>) -> T {
        let outcome = f(&mut *self.state.borrow_mut());
        match outcome {
            Ok(v) => v,
            Err(message) => {
                self.raise(&message);
                fail
            }
        }
    }

    fn create(&self, slot: Slot) -> Option<RawHandle> {
        Some(self.state.borrow_mut().insert(slot))
    }

    fn destroy(&self, h: RawHandle, kind: &'static str) {
        let refused = {
            let mut state = self.state.borrow_mut();
            let found = state.slots.get(&h).map(Slot::kind);
            match found {
                Some(k) if k == kind => {
                    state.remove(h);
                    None
                }
                Some(KIND_VIEW) => Some(format!("ignoring destroy of borrowed geometry {h}")),
                Some(k) => Some(format!("ignoring destroy of {k} handle {h} as {kind}")),
                None => Some(format!("ignoring destroy of unknown handle {h}")),
            }
        };
        if let Some(message) = refused {
            self.notice(&message);
        }
    }

    fn new_geom(&self, g: RawHandle, f: impl FnOnce(&Geom) -> Result<Geom, String>) -> Option<RawHandle> {
        self.guard(None, |s| {
            let out = f(s.geom(g)?)?;
            Ok(Some(s.insert_geom(out)))
        })
    }

    fn with_params(&self, p: RawHandle, f: impl FnOnce(&mut BufferParamsData) -> Result<(), String>) -> i32 {
        self.guard(STATUS_FAIL, |s| {
            f(s.params_mut(p)?)?;
            Ok(STATUS_OK)
        })
    }

    fn with_writer(&self, w: RawHandle, f: impl FnOnce(&mut WriterCfg) -> Result<(), String>) -> i32 {
        self.guard(STATUS_FAIL, |s| {
            f(s.writer_mut(w)?)?;
            Ok(STATUS_OK)
        })
    }
}

impl Engine for MemoryEngine {
    fn version(&self) -> String {
        concat!("memory-", env!("CARGO_PKG_VERSION")).to_string()
    }

    fn set_handlers(&self, notice: MessageHandler, error: MessageHandler) -> i32 {
        let mut slot = self.handlers.borrow_mut();
        if slot.is_some() {
            return STATUS_FAIL;
        }
        *slot = Some(Handlers { notice, error });
        STATUS_OK
    }

    fn clear_handlers(&self) {
        self.handlers.borrow_mut().take();
    }

    fn geom_clone(&self, g: RawHandle) -> Option<RawHandle> {
        let faults = self.clone_faults.get();
        if faults > 0 {
            self.clone_faults.set(faults - 1);
            self.raise("GEOSException: injected clone failure");
            return None;
        }
        self.new_geom(g, |geom| Ok(geom.clone()))
    }

    fn geom_destroy(&self, g: RawHandle) {
        self.destroy(g, KIND_GEOMETRY);
    }

    fn geom_type_id(&self, g: RawHandle) -> i32 {
        self.guard(-1, |s| Ok(s.geom(g)?.type_id()))
    }

    fn geom_type(&self, g: RawHandle) -> Option<String> {
        self.guard(None, |s| Ok(Some(s.geom(g)?.type_name().to_string())))
    }

    fn get_srid(&self, g: RawHandle) -> Option<i32> {
        self.guard(None, |s| Ok(Some(s.geom(g)?.srid)))
    }

    fn set_srid(&self, g: RawHandle, srid: i32) -> i32 {
        self.guard(STATUS_FAIL, |s| {
            s.geom_mut(g)?.srid = srid;
            Ok(STATUS_OK)
        })
    }

    fn is_empty(&self, g: RawHandle) -> i8 {
        self.guard(PRED_UNKNOWN, |s| Ok(pred(s.geom(g)?.is_empty())))
    }

    fn has_z(&self, g: RawHandle) -> i8 {
        self.guard(PRED_UNKNOWN, |s| Ok(pred(s.geom(g)?.has_z)))
    }

    fn is_closed(&self, g: RawHandle) -> i8 {
        self.guard(PRED_UNKNOWN, |s| {
            let geom = s.geom(g)?;
            match &geom.shape {
                Shape::LineString(cs) | Shape::LinearRing(cs) => Ok(pred(is_closed_line(cs))),
                Shape::MultiLineString(m) => Ok(pred(
                    !m.is_empty()
                        && m.iter()
                            .all(|l| l.as_line().map_or(false, is_closed_line)),
                )),
                _ => Err("IllegalArgumentException: Argument is not lineal".into()),
            }
        })
    }

    fn is_ring(&self, g: RawHandle) -> i8 {
        self.guard(PRED_UNKNOWN, |s| {
            let ring = s
                .geom(g)?
                .as_line()
                .map_or(false, |cs| cs.len() >= 4 && is_closed_line(cs));
            Ok(pred(ring))
        })
    }

    fn equals_exact(&self, a: RawHandle, b: RawHandle, tolerance: f64) -> i8 {
        self.guard(PRED_UNKNOWN, |s| {
            Ok(pred(s.geom(a)?.equals_exact(s.geom(b)?, tolerance)))
        })
    }

    fn relate_pattern_match(&self, matrix: &str, pattern: &str) -> i8 {
        self.guard(PRED_UNKNOWN, |_| {
            ops::relate_pattern_match(matrix, pattern).map(pred)
        })
    }

    fn num_geometries(&self, g: RawHandle) -> i32 {
        self.guard(-1, |s| Ok(count(s.geom(g)?.num_geometries())))
    }

    fn geometry_n(&self, g: RawHandle, n: i32) -> Option<RawHandle> {
        self.guard(None, |s| {
            let i = index(n)?;
            s.view(g, ChildRef::Member(i)).map(Some)
        })
    }

    fn num_interior_rings(&self, g: RawHandle) -> i32 {
        self.guard(-1, |s| match &s.geom(g)?.shape {
            Shape::Polygon(rings) => Ok(count(rings.len().saturating_sub(1))),
            _ => Err("IllegalArgumentException: Argument is not a Polygon".into()),
        })
    }

    fn interior_ring_n(&self, g: RawHandle, n: i32) -> Option<RawHandle> {
        self.guard(None, |s| {
            let i = index(n)?;
            s.view(g, ChildRef::Interior(i)).map(Some)
        })
    }

    fn exterior_ring(&self, g: RawHandle) -> Option<RawHandle> {
        self.guard(None, |s| s.view(g, ChildRef::Exterior).map(Some))
    }

    fn num_points(&self, g: RawHandle) -> i32 {
        self.guard(-1, |s| Ok(count(s.geom(g)?.as_line()?.len())))
    }

    fn point_n(&self, g: RawHandle, n: i32) -> Option<RawHandle> {
        self.new_geom(g, |geom| {
            let c = index(n).and_then(|i| {
                geom.as_line()?
                    .get(i)
                    .copied()
                    .ok_or_else(|| "IllegalArgumentException: Index out of range".to_string())
            })?;
            let mut p = Geom::point(c);
            p.srid = geom.srid;
            Ok(p)
        })
    }

    // An empty line has no end points; the C engine returns null here
    // without raising, so neither do we.
    fn start_point(&self, g: RawHandle) -> Option<RawHandle> {
        self.guard(None, |s| {
            let geom = s.geom(g)?;
            let Some(&c) = geom.as_line()?.first() else {
                return Ok(None);
            };
            let mut p = Geom::point(c);
            p.srid = geom.srid;
            Ok(Some(s.insert_geom(p)))
        })
    }

    fn end_point(&self, g: RawHandle) -> Option<RawHandle> {
        self.guard(None, |s| {
            let geom = s.geom(g)?;
            let Some(&c) = geom.as_line()?.last() else {
                return Ok(None);
            };
            let mut p = Geom::point(c);
            p.srid = geom.srid;
            Ok(Some(s.insert_geom(p)))
        })
    }

    fn get_x(&self, g: RawHandle) -> Option<f64> {
        self.guard(None, |s| match &s.geom(g)?.shape {
            Shape::Point(Some(c)) => Ok(Some(c.x)),
            Shape::Point(None) => Err("IllegalArgumentException: getX called on empty Point".into()),
            _ => Err("IllegalArgumentException: Argument is not a Point".into()),
        })
    }

    fn get_y(&self, g: RawHandle) -> Option<f64> {
        self.guard(None, |s| match &s.geom(g)?.shape {
            Shape::Point(Some(c)) => Ok(Some(c.y)),
            Shape::Point(None) => Err("IllegalArgumentException: getY called on empty Point".into()),
            _ => Err("IllegalArgumentException: Argument is not a Point".into()),
        })
    }

    fn num_coordinates(&self, g: RawHandle) -> i32 {
        self.guard(-1, |s| Ok(count(s.geom(g)?.num_coordinates())))
    }

    fn dimension(&self, g: RawHandle) -> i32 {
        self.guard(-1, |s| Ok(s.geom(g)?.dimension()))
    }

    fn coordinate_dimension(&self, g: RawHandle) -> i32 {
        self.guard(-1, |s| Ok(if s.geom(g)?.has_z { 3 } else { 2 }))
    }

    fn area(&self, g: RawHandle) -> Option<f64> {
        self.guard(None, |s| Ok(Some(ops::area(s.geom(g)?))))
    }

    fn length(&self, g: RawHandle) -> Option<f64> {
        self.guard(None, |s| Ok(Some(ops::length(s.geom(g)?))))
    }

    fn envelope(&self, g: RawHandle) -> Option<RawHandle> {
        self.new_geom(g, |geom| Ok(ops::envelope(geom)))
    }

    fn buffer_params_create(&self) -> Option<RawHandle> {
        self.create(Slot::BufferParams(BufferParamsData::default()))
    }

    fn buffer_params_destroy(&self, p: RawHandle) {
        self.destroy(p, KIND_BUFFER_PARAMS);
    }

    fn buffer_params_set_quadrant_segments(&self, p: RawHandle, segments: i32) -> i32 {
        self.with_params(p, |data| {
            if segments > ops::MAX_QUADRANT_SEGMENTS {
                return Err(format!(
                    "IllegalArgumentException: quadrant segments {segments} exceeds {}",
                    ops::MAX_QUADRANT_SEGMENTS
                ));
            }
            data.quadrant_segments = segments;
            Ok(())
        })
    }

    fn buffer_params_set_end_cap_style(&self, p: RawHandle, style: i32) -> i32 {
        self.with_params(p, |data| {
            if !(CAP_ROUND..=CAP_SQUARE).contains(&style) {
                return Err(format!("IllegalArgumentException: Invalid buffer endCap style {style}"));
            }
            data.end_cap_style = style;
            Ok(())
        })
    }

    fn buffer_params_set_join_style(&self, p: RawHandle, style: i32) -> i32 {
        self.with_params(p, |data| {
            if !(JOIN_ROUND..=JOIN_BEVEL).contains(&style) {
                return Err(format!("IllegalArgumentException: Invalid buffer join style {style}"));
            }
            data.join_style = style;
            Ok(())
        })
    }

    fn buffer_params_set_mitre_limit(&self, p: RawHandle, limit: f64) -> i32 {
        self.with_params(p, |data| {
            data.mitre_limit = limit;
            Ok(())
        })
    }

    fn buffer_params_set_single_sided(&self, p: RawHandle, single_sided: bool) -> i32 {
        self.with_params(p, |data| {
            data.single_sided = single_sided;
            Ok(())
        })
    }

    fn buffer_with_params(&self, g: RawHandle, p: RawHandle, width: f64) -> Option<RawHandle> {
        self.guard(None, |s| {
            let params = *s.params_mut(p)?;
            let out = ops::buffer(s.geom(g)?, &params, width)?;
            Ok(Some(s.insert_geom(out)))
        })
    }

    fn polygonize_full(&self, g: RawHandle) -> Option<PolygonizeOutput> {
        self.guard(None, |s| {
            let out = ops::polygonize(s.geom(g)?);
            Ok(Some(PolygonizeOutput {
                rings: s.insert_geom(out.rings),
                cut_edges: s.insert_geom(out.cut_edges),
                dangles: s.insert_geom(out.dangles),
                invalid_rings: s.insert_geom(out.invalid_rings),
            }))
        })
    }

    fn line_merge(&self, g: RawHandle) -> Option<RawHandle> {
        self.new_geom(g, |geom| Ok(ops::line_merge(geom)))
    }

    fn shared_paths(&self, a: RawHandle, b: RawHandle) -> Option<RawHandle> {
        self.guard(None, |s| {
            let out = ops::shared_paths(s.geom(a)?, s.geom(b)?)?;
            Ok(Some(s.insert_geom(out)))
        })
    }

    fn wkt_reader_create(&self) -> Option<RawHandle> {
        self.create(Slot::WktReader)
    }

    fn wkt_reader_destroy(&self, r: RawHandle) {
        self.destroy(r, KIND_WKT_READER);
    }

    fn wkt_reader_read(&self, r: RawHandle, text: &str) -> Option<RawHandle> {
        self.guard(None, |s| {
            s.expect_kind(r, KIND_WKT_READER)?;
            let g = wkt::parse(text)?;
            Ok(Some(s.insert_geom(g)))
        })
    }

    fn wkt_write(&self, g: RawHandle) -> Option<String> {
        self.guard(None, |s| Ok(Some(wkt::write(s.geom(g)?))))
    }

    fn wkb_writer_create(&self) -> Option<RawHandle> {
        self.create(Slot::WkbWriter(WriterCfg::default()))
    }

    fn wkb_writer_destroy(&self, w: RawHandle) {
        self.destroy(w, KIND_WKB_WRITER);
    }

    fn wkb_writer_get_output_dimension(&self, w: RawHandle) -> i32 {
        self.guard(-1, |s| Ok(s.writer_mut(w)?.output_dimension))
    }

    fn wkb_writer_set_output_dimension(&self, w: RawHandle, dimension: i32) -> i32 {
        self.with_writer(w, |cfg| {
            if !(2..=3).contains(&dimension) {
                return Err("IllegalArgumentException: WKB output dimension must be 2 or 3".into());
            }
            cfg.output_dimension = dimension;
            Ok(())
        })
    }

    fn wkb_writer_get_byte_order(&self, w: RawHandle) -> i32 {
        self.guard(-1, |s| Ok(s.writer_mut(w)?.byte_order))
    }

    fn wkb_writer_set_byte_order(&self, w: RawHandle, order: i32) -> i32 {
        self.with_writer(w, |cfg| {
            if !(0..=1).contains(&order) {
                return Err(format!("IllegalArgumentException: Invalid byte order {order}"));
            }
            cfg.byte_order = order;
            Ok(())
        })
    }

    fn wkb_writer_get_include_srid(&self, w: RawHandle) -> i8 {
        self.guard(PRED_UNKNOWN, |s| Ok(pred(s.writer_mut(w)?.include_srid)))
    }

    fn wkb_writer_set_include_srid(&self, w: RawHandle, include: bool) -> i32 {
        self.with_writer(w, |cfg| {
            cfg.include_srid = include;
            Ok(())
        })
    }

    fn wkb_writer_write(&self, w: RawHandle, g: RawHandle) -> Option<Vec<u8>> {
        self.guard(None, |s| {
            let cfg = *s.writer_mut(w)?;
            Ok(Some(wkb::write(s.geom(g)?, &cfg)))
        })
    }

    fn wkb_writer_write_hex(&self, w: RawHandle, g: RawHandle) -> Option<String> {
        self.guard(None, |s| {
            let cfg = *s.writer_mut(w)?;
            Ok(Some(hex::encode_upper(wkb::write(s.geom(g)?, &cfg))))
        })
    }

    fn wkb_reader_create(&self) -> Option<RawHandle> {
        self.create(Slot::WkbReader)
    }

    fn wkb_reader_destroy(&self, r: RawHandle) {
        self.destroy(r, KIND_WKB_READER);
    }

    fn wkb_reader_read(&self, r: RawHandle, bytes: &[u8]) -> Option<RawHandle> {
        self.guard(None, |s| {
            s.expect_kind(r, KIND_WKB_READER)?;
            let g = wkb::read(bytes)?;
            Ok(Some(s.insert_geom(g)))
        })
    }

    fn wkb_reader_read_hex(&self, r: RawHandle, text: &[u8]) -> Option<RawHandle> {
        self.guard(None, |s| {
            s.expect_kind(r, KIND_WKB_READER)?;
            let g = wkb::read_hex(text)?;
            Ok(Some(s.insert_geom(g)))
        })
    }
}
