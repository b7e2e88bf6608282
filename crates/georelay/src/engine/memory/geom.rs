//! Geometry values held by the reference engine.
//!
//! - `Geom`: one geometry with its SRID and Z flag; children are stored
//!   inline so a borrowed child is addressed by a `ChildRef` path.
//! - Polygon rings are `LinearRing` geometries (exterior first) so rings can
//!   be borrowed like any other child.
//! - Readers refuse collections nested deeper than [`MAX_DEPTH`], so the
//!   recursive walks over a `Geom` (clone, drop, writers) stay shallow.

use nalgebra::Vector2;

/// Deepest collection nesting the readers accept.
pub const MAX_DEPTH: usize = 64;

pub fn too_deep() -> String {
    format!("ParseException: geometry nesting exceeds {MAX_DEPTH} levels")
}

pub const TYPE_POINT: i32 = 0;
pub const TYPE_LINESTRING: i32 = 1;
pub const TYPE_LINEARRING: i32 = 2;
pub const TYPE_POLYGON: i32 = 3;
pub const TYPE_MULTIPOINT: i32 = 4;
pub const TYPE_MULTILINESTRING: i32 = 5;
pub const TYPE_MULTIPOLYGON: i32 = 6;
pub const TYPE_GEOMETRYCOLLECTION: i32 = 7;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Coord {
    #[inline]
    pub fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }
    #[inline]
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }
    #[inline]
    pub fn vec2(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
    #[inline]
    pub fn same_xy(&self, other: &Coord) -> bool {
        self.x == other.x && self.y == other.y
    }
    /// Hashable node key; `-0.0` and `0.0` collapse.
    #[inline]
    pub fn key(&self) -> (u64, u64) {
        ((self.x + 0.0).to_bits(), (self.y + 0.0).to_bits())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Point(Option<Coord>),
    LineString(Vec<Coord>),
    LinearRing(Vec<Coord>),
    /// Rings, exterior first; empty for `POLYGON EMPTY`.
    Polygon(Vec<Geom>),
    MultiPoint(Vec<Geom>),
    MultiLineString(Vec<Geom>),
    MultiPolygon(Vec<Geom>),
    GeometryCollection(Vec<Geom>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geom {
    pub shape: Shape,
    pub srid: i32,
    pub has_z: bool,
}

/// One step from a geometry to a borrowed child.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildRef {
    Member(usize),
    Exterior,
    Interior(usize),
}

impl Geom {
    pub fn new(shape: Shape, has_z: bool) -> Self {
        Self {
            shape,
            srid: 0,
            has_z,
        }
    }

    pub fn point(c: Coord) -> Self {
        let has_z = c.z.is_some();
        Self::new(Shape::Point(Some(c)), has_z)
    }

    pub fn line(coords: Vec<Coord>) -> Self {
        let has_z = coords.first().map_or(false, |c| c.z.is_some());
        Self::new(Shape::LineString(coords), has_z)
    }

    pub fn ring(coords: Vec<Coord>) -> Self {
        let has_z = coords.first().map_or(false, |c| c.z.is_some());
        Self::new(Shape::LinearRing(coords), has_z)
    }

    pub fn polygon(shell: Vec<Coord>) -> Self {
        let ring = Self::ring(shell);
        let has_z = ring.has_z;
        Self::new(Shape::Polygon(vec![ring]), has_z)
    }

    pub fn empty_polygon() -> Self {
        Self::new(Shape::Polygon(Vec::new()), false)
    }

    /// Collection of the given members; Z if any member has Z.
    pub fn collection(members: Vec<Geom>, make: fn(Vec<Geom>) -> Shape) -> Self {
        let has_z = members.iter().any(|m| m.has_z);
        Self::new(make(members), has_z)
    }

    pub fn type_id(&self) -> i32 {
        match self.shape {
            Shape::Point(_) => TYPE_POINT,
            Shape::LineString(_) => TYPE_LINESTRING,
            Shape::LinearRing(_) => TYPE_LINEARRING,
            Shape::Polygon(_) => TYPE_POLYGON,
            Shape::MultiPoint(_) => TYPE_MULTIPOINT,
            Shape::MultiLineString(_) => TYPE_MULTILINESTRING,
            Shape::MultiPolygon(_) => TYPE_MULTIPOLYGON,
            Shape::GeometryCollection(_) => TYPE_GEOMETRYCOLLECTION,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.shape {
            Shape::Point(_) => "Point",
            Shape::LineString(_) => "LineString",
            Shape::LinearRing(_) => "LinearRing",
            Shape::Polygon(_) => "Polygon",
            Shape::MultiPoint(_) => "MultiPoint",
            Shape::MultiLineString(_) => "MultiLineString",
            Shape::MultiPolygon(_) => "MultiPolygon",
            Shape::GeometryCollection(_) => "GeometryCollection",
        }
    }

    pub fn members(&self) -> Option<&[Geom]> {
        match &self.shape {
            Shape::MultiPoint(m)
            | Shape::MultiLineString(m)
            | Shape::MultiPolygon(m)
            | Shape::GeometryCollection(m) => Some(m),
            _ => None,
        }
    }

    fn members_mut(&mut self) -> Option<&mut Vec<Geom>> {
        match &mut self.shape {
            Shape::MultiPoint(m)
            | Shape::MultiLineString(m)
            | Shape::MultiPolygon(m)
            | Shape::GeometryCollection(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.shape {
            Shape::Point(c) => c.is_none(),
            Shape::LineString(cs) | Shape::LinearRing(cs) => cs.is_empty(),
            Shape::Polygon(rings) => rings.is_empty(),
            _ => self.members().map_or(true, |m| m.iter().all(Geom::is_empty)),
        }
    }

    /// Number of direct children; simple geometries count themselves.
    pub fn num_geometries(&self) -> usize {
        self.members().map_or(1, <[Geom]>::len)
    }

    pub fn num_coordinates(&self) -> usize {
        match &self.shape {
            Shape::Point(c) => usize::from(c.is_some()),
            Shape::LineString(cs) | Shape::LinearRing(cs) => cs.len(),
            Shape::Polygon(rings) => rings.iter().map(Geom::num_coordinates).sum(),
            _ => self
                .members()
                .map_or(0, |m| m.iter().map(Geom::num_coordinates).sum()),
        }
    }

    /// Topological dimension; empty collections report 0.
    pub fn dimension(&self) -> i32 {
        match &self.shape {
            Shape::Point(_) | Shape::MultiPoint(_) => 0,
            Shape::LineString(_) | Shape::LinearRing(_) | Shape::MultiLineString(_) => 1,
            Shape::Polygon(_) | Shape::MultiPolygon(_) => 2,
            Shape::GeometryCollection(m) => m.iter().map(Geom::dimension).max().unwrap_or(0),
        }
    }

    /// Visit every coordinate in storage order.
    pub fn for_each_coord(&self, f: &mut dyn FnMut(&Coord)) {
        match &self.shape {
            Shape::Point(Some(c)) => f(c),
            Shape::Point(None) => {}
            Shape::LineString(cs) | Shape::LinearRing(cs) => {
                for c in cs {
                    f(c);
                }
            }
            Shape::Polygon(rings) => {
                for r in rings {
                    r.for_each_coord(f);
                }
            }
            _ => {
                for g in self.members().unwrap_or_default() {
                    g.for_each_coord(f);
                }
            }
        }
    }

    /// Visit every line-like component (linestrings, rings, polygon rings).
    pub fn for_each_line(&self, f: &mut dyn FnMut(&[Coord])) {
        match &self.shape {
            Shape::Point(_) => {}
            Shape::LineString(cs) | Shape::LinearRing(cs) => f(cs),
            Shape::Polygon(rings) => {
                for r in rings {
                    r.for_each_line(f);
                }
            }
            _ => {
                for g in self.members().unwrap_or_default() {
                    g.for_each_line(f);
                }
            }
        }
    }

    pub fn child(&self, step: ChildRef) -> Result<&Geom, String> {
        match (step, &self.shape) {
            (ChildRef::Member(i), _) => match self.members() {
                Some(m) => m
                    .get(i)
                    .ok_or_else(|| format!("IllegalArgumentException: geometry index {i} out of range")),
                None if i == 0 => Ok(self),
                None => Err(format!("IllegalArgumentException: geometry index {i} out of range")),
            },
            (ChildRef::Exterior, Shape::Polygon(rings)) => rings
                .first()
                .ok_or_else(|| "IllegalArgumentException: empty Polygon has no exterior ring".into()),
            (ChildRef::Interior(i), Shape::Polygon(rings)) => rings
                .get(i + 1)
                .ok_or_else(|| format!("IllegalArgumentException: interior ring {i} out of range")),
            _ => Err("IllegalArgumentException: Argument is not a Polygon".into()),
        }
    }

    pub fn child_mut(&mut self, step: ChildRef) -> Result<&mut Geom, String> {
        if let ChildRef::Member(i) = step {
            if self.members().is_none() && i == 0 {
                return Ok(self);
            }
            return self
                .members_mut()
                .and_then(|m| m.get_mut(i))
                .ok_or_else(|| format!("IllegalArgumentException: geometry index {i} out of range"));
        }
        match (step, &mut self.shape) {
            (ChildRef::Exterior, Shape::Polygon(rings)) => rings
                .first_mut()
                .ok_or_else(|| "IllegalArgumentException: empty Polygon has no exterior ring".into()),
            (ChildRef::Interior(i), Shape::Polygon(rings)) => rings
                .get_mut(i + 1)
                .ok_or_else(|| format!("IllegalArgumentException: interior ring {i} out of range")),
            _ => Err("IllegalArgumentException: Argument is not a Polygon".into()),
        }
    }

    pub fn resolve(&self, path: &[ChildRef]) -> Result<&Geom, String> {
        path.iter().try_fold(self, |g, step| g.child(*step))
    }

    pub fn resolve_mut(&mut self, path: &[ChildRef]) -> Result<&mut Geom, String> {
        let mut g = self;
        for step in path {
            g = g.child_mut(*step)?;
        }
        Ok(g)
    }

    /// Line coordinates for point-sequence accessors.
    pub fn as_line(&self) -> Result<&[Coord], String> {
        match &self.shape {
            Shape::LineString(cs) | Shape::LinearRing(cs) => Ok(cs),
            _ => Err("IllegalArgumentException: Argument is not a LineString".into()),
        }
    }

    /// Same type, same structure, XY within `tolerance`.
    pub fn equals_exact(&self, other: &Geom, tolerance: f64) -> bool {
        let close = |a: &Coord, b: &Coord| (a.vec2() - b.vec2()).norm() <= tolerance;
        let seq = |a: &[Coord], b: &[Coord]| {
            a.len() == b.len() && a.iter().zip(b).all(|(p, q)| close(p, q))
        };
        let all = |a: &[Geom], b: &[Geom]| {
            a.len() == b.len() && a.iter().zip(b).all(|(p, q)| p.equals_exact(q, tolerance))
        };
        match (&self.shape, &other.shape) {
            (Shape::Point(a), Shape::Point(b)) => match (a, b) {
                (Some(a), Some(b)) => close(a, b),
                (None, None) => true,
                _ => false,
            },
            (Shape::LineString(a), Shape::LineString(b)) => seq(a, b),
            (Shape::LinearRing(a), Shape::LinearRing(b)) => seq(a, b),
            (Shape::Polygon(a), Shape::Polygon(b)) => all(a, b),
            (Shape::MultiPoint(a), Shape::MultiPoint(b)) => all(a, b),
            (Shape::MultiLineString(a), Shape::MultiLineString(b)) => all(a, b),
            (Shape::MultiPolygon(a), Shape::MultiPolygon(b)) => all(a, b),
            (Shape::GeometryCollection(a), Shape::GeometryCollection(b)) => all(a, b),
            _ => false,
        }
    }
}
