//! Operations returning heterogeneous geometry sets.
//!
//! The engine hands back one owned collection per result category. Each is
//! bound to a temporary wrapper, decomposed into owned children, and released
//! when the wrapper goes out of scope.

use crate::decompose::decompose;
use crate::error::Result;
use crate::geometry::Geometry;
use crate::relay::{adopt, Wrapper};
use crate::session::Session;

/// Output of [`polygonize`]: one owned geometry per element.
#[derive(Debug, Default)]
pub struct Polygonized {
    pub rings: Vec<Geometry>,
    pub cut_edges: Vec<Geometry>,
    pub dangles: Vec<Geometry>,
    pub invalid_rings: Vec<Geometry>,
}

/// Polygonize the linework of `g`.
pub fn polygonize(g: &Geometry) -> Result<Polygonized> {
    let session = g.session();
    let raw = g.raw()?;
    let out = session.value(session.engine().polygonize_full(raw))?;
    // Bind all four before decomposing so none leaks if one step fails.
    let rings: Geometry = adopt(session, Some(out.rings))?;
    let cut_edges: Geometry = adopt(session, Some(out.cut_edges))?;
    let dangles: Geometry = adopt(session, Some(out.dangles))?;
    let invalid_rings: Geometry = adopt(session, Some(out.invalid_rings))?;
    Ok(Polygonized {
        rings: decompose(&rings)?,
        cut_edges: decompose(&cut_edges)?,
        dangles: decompose(&dangles)?,
        invalid_rings: decompose(&invalid_rings)?,
    })
}

/// Sew connected lines together; one element per merged line.
pub fn line_merge(g: &Geometry) -> Result<Vec<Geometry>> {
    let session = g.session();
    let raw = g.raw()?;
    let merged: Geometry = adopt(session, session.engine().line_merge(raw))?;
    decompose(&merged)
}

/// Paths shared by two lineal geometries: a collection of two multi-lines,
/// same direction first, opposite direction second.
pub fn shared_paths(a: &Geometry, b: &Geometry) -> Result<Geometry> {
    let session = a.session();
    session.ensure_same(b.session())?;
    let (ra, rb) = (a.raw()?, b.raw()?);
    adopt(session, session.engine().shared_paths(ra, rb))
}

/// Match a DE-9IM intersection matrix against a pattern.
pub fn relate_match(session: &Session, matrix: &str, pattern: &str) -> Result<bool> {
    session.decide(session.engine().relate_pattern_match(matrix, pattern))
}

pub fn engine_version(session: &Session) -> String {
    session.version()
}
