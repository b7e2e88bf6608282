//! Geometry wrapper.
//!
//! A `Geometry` owns exactly one engine geometry and carries nothing else:
//! type, coordinates and SRID are always queried through the engine. The
//! type is move-only; use [`Geometry::deep_clone`] for an independent copy.

use std::fmt;

use crate::bridge::engine_index;
use crate::decompose::{self, Child};
use crate::error::{RelayError, Result};
use crate::params::{BufferParams, BufferStyle};
use crate::relay::{adopt, Relay, ResourceKind, Wrapper};

/// Engine geometry type ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Point = 0,
    LineString = 1,
    LinearRing = 2,
    Polygon = 3,
    MultiPoint = 4,
    MultiLineString = 5,
    MultiPolygon = 6,
    GeometryCollection = 7,
}

impl GeometryType {
    pub fn from_id(id: usize) -> Option<Self> {
        use GeometryType::*;
        [
            Point,
            LineString,
            LinearRing,
            Polygon,
            MultiPoint,
            MultiLineString,
            MultiPolygon,
            GeometryCollection,
        ]
        .get(id)
        .copied()
    }

    /// Collection types whose children are reached through `geometry_n`.
    pub fn is_composite(self) -> bool {
        self as i32 >= GeometryType::MultiPoint as i32
    }
}

#[derive(Debug)]
pub struct Geometry {
    relay: Relay,
}

impl Wrapper for Geometry {
    const KIND: ResourceKind = ResourceKind::Geometry;

    fn relay(&self) -> &Relay {
        &self.relay
    }

    fn from_relay(relay: Relay) -> Self {
        Self { relay }
    }
}

impl Geometry {
    /// Trimmed well-known text.
    pub fn to_wkt(&self) -> Result<String> {
        let g = self.raw()?;
        self.session().value(self.session().engine().wkt_write(g))
    }

    pub fn type_name(&self) -> Result<String> {
        let g = self.raw()?;
        self.session().value(self.session().engine().geom_type(g))
    }

    pub fn type_id(&self) -> Result<usize> {
        let g = self.raw()?;
        self.session().count(self.session().engine().geom_type_id(g))
    }

    pub fn geometry_type(&self) -> Result<GeometryType> {
        let id = self.type_id()?;
        GeometryType::from_id(id).ok_or_else(|| RelayError::engine(format!("unknown geometry type id {id}")))
    }

    pub fn srid(&self) -> Result<i32> {
        let g = self.raw()?;
        self.session().value(self.session().engine().get_srid(g))
    }

    pub fn set_srid(&mut self, srid: i32) -> Result<()> {
        let g = self.raw()?;
        self.session().status(self.session().engine().set_srid(g, srid))
    }

    pub fn is_empty(&self) -> Result<bool> {
        let g = self.raw()?;
        self.session().decide(self.session().engine().is_empty(g))
    }

    pub fn has_z(&self) -> Result<bool> {
        let g = self.raw()?;
        self.session().decide(self.session().engine().has_z(g))
    }

    /// Lineal input only; other types fail with the engine's error.
    pub fn is_closed(&self) -> Result<bool> {
        let g = self.raw()?;
        self.session().decide(self.session().engine().is_closed(g))
    }

    pub fn is_ring(&self) -> Result<bool> {
        let g = self.raw()?;
        self.session().decide(self.session().engine().is_ring(g))
    }

    pub fn equals_exact(&self, other: &Geometry, tolerance: f64) -> Result<bool> {
        self.session().ensure_same(other.session())?;
        let (a, b) = (self.raw()?, other.raw()?);
        self.session()
            .decide(self.session().engine().equals_exact(a, b, tolerance))
    }

    /// Direct children; 1 for non-composite geometries.
    pub fn num_geometries(&self) -> Result<usize> {
        let g = self.raw()?;
        self.session().count(self.session().engine().num_geometries(g))
    }

    /// Owned copy of child `n`.
    pub fn geometry_n(&self, n: usize) -> Result<Geometry> {
        decompose::child(self, Child::Member(n))
    }

    pub fn num_interior_rings(&self) -> Result<usize> {
        let g = self.raw()?;
        self.session().count(self.session().engine().num_interior_rings(g))
    }

    pub fn interior_ring_n(&self, n: usize) -> Result<Geometry> {
        decompose::child(self, Child::Interior(n))
    }

    pub fn exterior_ring(&self) -> Result<Geometry> {
        decompose::child(self, Child::Exterior)
    }

    pub fn num_points(&self) -> Result<usize> {
        let g = self.raw()?;
        self.session().count(self.session().engine().num_points(g))
    }

    pub fn point_n(&self, n: usize) -> Result<Geometry> {
        let len = self.num_points()?;
        if n >= len {
            return Err(RelayError::IndexOutOfRange { index: n, len });
        }
        let g = self.raw()?;
        let i = engine_index(n, len)?;
        adopt(self.session(), self.session().engine().point_n(g, i))
    }

    pub fn start_point(&self) -> Result<Geometry> {
        let g = self.raw()?;
        adopt(self.session(), self.session().engine().start_point(g))
    }

    pub fn end_point(&self) -> Result<Geometry> {
        let g = self.raw()?;
        adopt(self.session(), self.session().engine().end_point(g))
    }

    pub fn x(&self) -> Result<f64> {
        let g = self.raw()?;
        self.session().value(self.session().engine().get_x(g))
    }

    pub fn y(&self) -> Result<f64> {
        let g = self.raw()?;
        self.session().value(self.session().engine().get_y(g))
    }

    pub fn num_coordinates(&self) -> Result<usize> {
        let g = self.raw()?;
        self.session().count(self.session().engine().num_coordinates(g))
    }

    pub fn dimension(&self) -> Result<usize> {
        let g = self.raw()?;
        self.session().count(self.session().engine().dimension(g))
    }

    pub fn coordinate_dimension(&self) -> Result<usize> {
        let g = self.raw()?;
        self.session().count(self.session().engine().coordinate_dimension(g))
    }

    pub fn area(&self) -> Result<f64> {
        let g = self.raw()?;
        self.session().value(self.session().engine().area(g))
    }

    pub fn length(&self) -> Result<f64> {
        let g = self.raw()?;
        self.session().value(self.session().engine().length(g))
    }

    pub fn envelope(&self) -> Result<Geometry> {
        let g = self.raw()?;
        adopt(self.session(), self.session().engine().envelope(g))
    }

    /// Buffer by `width`; unset style fields keep the engine defaults.
    pub fn buffer(&self, width: f64, style: &BufferStyle) -> Result<Geometry> {
        let g = self.raw()?;
        let params = BufferParams::build(self.session(), style)?;
        let out = self
            .session()
            .engine()
            .buffer_with_params(g, params.raw()?, width);
        drop(params);
        adopt(self.session(), out)
    }

    /// Owned copies of the direct children, in order.
    pub fn components(&self) -> Result<Vec<Geometry>> {
        decompose::decompose(self)
    }

    /// Independent engine copy bound to a new wrapper.
    pub fn deep_clone(&self) -> Result<Geometry> {
        let g = self.raw()?;
        adopt(self.session(), self.session().engine().geom_clone(g))
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_wkt() {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::engine::memory::MemoryEngine;
    use crate::prelude::*;

    fn setup() -> (Rc<MemoryEngine>, Session, WktReader) {
        let engine = Rc::new(MemoryEngine::new());
        let session = Session::open_shared(engine.clone()).unwrap();
        let reader = WktReader::new(&session).unwrap();
        (engine, session, reader)
    }

    #[test]
    fn metadata_queries() {
        let (_e, _s, r) = setup();
        let mut g = r.read("LINESTRING Z (0 0 1, 3 4 1)").unwrap();
        assert_eq!(g.type_name().unwrap(), "LineString");
        assert_eq!(g.geometry_type().unwrap(), GeometryType::LineString);
        assert!(g.has_z().unwrap());
        assert!(!g.is_empty().unwrap());
        assert!(!g.is_closed().unwrap());
        assert_eq!(g.length().unwrap(), 5.0);
        assert_eq!(g.num_points().unwrap(), 2);
        assert_eq!(g.coordinate_dimension().unwrap(), 3);
        assert_eq!(g.dimension().unwrap(), 1);
        assert_eq!(g.srid().unwrap(), 0);
        g.set_srid(3857).unwrap();
        assert_eq!(g.srid().unwrap(), 3857);
        assert_eq!(g.to_string(), "LINESTRING Z (0 0 1, 3 4 1)");
    }

    #[test]
    fn point_accessors_return_owned_points() {
        let (engine, _s, r) = setup();
        let line = r.read("LINESTRING (0 0, 1 1, 2 0)").unwrap();
        let p = line.point_n(1).unwrap();
        assert_eq!((p.x().unwrap(), p.y().unwrap()), (1.0, 1.0));
        assert_eq!(line.start_point().unwrap().to_wkt().unwrap(), "POINT (0 0)");
        assert_eq!(line.end_point().unwrap().to_wkt().unwrap(), "POINT (2 0)");
        assert_eq!(
            line.point_n(3).unwrap_err(),
            RelayError::IndexOutOfRange { index: 3, len: 3 }
        );
        drop(line);
        // `p` survives its source line.
        assert_eq!(p.to_wkt().unwrap(), "POINT (1 1)");
        drop(p);
        assert_eq!(engine.live_views(), 0);
    }

    #[test]
    fn start_point_of_empty_line_is_generic_failure() {
        let (_e, _s, r) = setup();
        let empty = r.read("LINESTRING EMPTY").unwrap();
        assert_eq!(
            empty.start_point().unwrap_err(),
            RelayError::engine("operation returned no result")
        );
    }

    #[test]
    fn predicate_error_is_not_false() {
        let (_e, s, r) = setup();
        let p = r.read("POINT (1 2)").unwrap();
        let err = p.is_closed().unwrap_err();
        assert!(matches!(err, RelayError::EngineFailure { ref message } if message.contains("lineal")));
        // The session stays usable.
        assert_eq!(p.x().unwrap(), 1.0);
        assert_eq!(s.notices(), 0);
    }

    #[test]
    fn rings_are_cloned_out_of_polygons() {
        let (engine, _s, r) = setup();
        let poly = r
            .read("POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0), (1 1, 2 1, 2 2, 1 1))")
            .unwrap();
        assert_eq!(poly.num_interior_rings().unwrap(), 1);
        let shell = poly.exterior_ring().unwrap();
        let hole = poly.interior_ring_n(0).unwrap();
        assert_eq!(
            poly.interior_ring_n(1).unwrap_err(),
            RelayError::IndexOutOfRange { index: 1, len: 1 }
        );
        assert_eq!(poly.area().unwrap(), 99.5);
        drop(poly);
        assert!(shell.is_ring().unwrap());
        assert_eq!(hole.to_wkt().unwrap(), "LINEARRING (1 1, 2 1, 2 2, 1 1)");
        assert_eq!(engine.live_views(), 0);
    }

    #[test]
    fn envelope_and_deep_clone() {
        let (_e, _s, r) = setup();
        let g = r.read("MULTIPOINT ((0 0), (2 3))").unwrap();
        let env = g.envelope().unwrap();
        assert_eq!(env.to_wkt().unwrap(), "POLYGON ((0 0, 2 0, 2 3, 0 3, 0 0))");
        let copy = g.deep_clone().unwrap();
        assert!(copy.equals_exact(&g, 0.0).unwrap());
        assert_ne!(copy.raw().unwrap(), g.raw().unwrap());
    }

    #[test]
    fn buffer_applies_style_and_releases_params() {
        let (engine, _s, r) = setup();
        let p = r.read("POINT (0 0)").unwrap();
        let before = engine.live_handles();
        let b = p.buffer(1.0, &BufferStyle::default().quad_segs(1)).unwrap();
        // The parameter object is gone; only the result was added.
        assert_eq!(engine.live_handles(), before + 1);
        assert_eq!(b.exterior_ring().unwrap().num_points().unwrap(), 5);
        assert!((b.area().unwrap() - 2.0).abs() < 1e-12);

        let line = r.read("LINESTRING (0 0, 1 0)").unwrap();
        let before = engine.live_handles();
        assert!(matches!(
            line.buffer(1.0, &BufferStyle::default()),
            Err(RelayError::EngineFailure { .. })
        ));
        assert_eq!(engine.live_handles(), before);
    }

    #[test]
    fn geometries_from_different_sessions_do_not_mix() {
        let (_e, _s, r) = setup();
        let other = Session::open(MemoryEngine::new()).unwrap();
        let a = r.read("POINT (0 0)").unwrap();
        let b = WktReader::new(&other).unwrap().read("POINT (0 0)").unwrap();
        assert!(matches!(
            a.equals_exact(&b, 0.0),
            Err(RelayError::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn geometry_type_ids() {
        assert_eq!(GeometryType::from_id(3), Some(GeometryType::Polygon));
        assert_eq!(GeometryType::from_id(8), None);
        assert!(GeometryType::GeometryCollection.is_composite());
        assert!(!GeometryType::Polygon.is_composite());
    }
}
