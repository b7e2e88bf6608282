//! Geometric operations of the reference engine.
//!
//! These stay deliberately small: the relay layer only needs results with
//! the right shape and ownership. Assumptions
//! - Linework given to `polygonize`, `line_merge` and `shared_paths` is
//!   already noded (lines meet only at shared endpoints).
//! - `buffer` supports puntal input only.

use std::collections::{HashMap, HashSet};

use nalgebra::Vector2;

use super::geom::{Coord, Geom, Shape};

/// Signed shoelace area of a closed ring.
fn ring_area(cs: &[Coord]) -> f64 {
    let twice: f64 = cs
        .windows(2)
        .map(|w| {
            let (a, b) = (w[0].vec2(), w[1].vec2());
            a.x * b.y - a.y * b.x
        })
        .sum();
    twice / 2.0
}

fn seq_length(cs: &[Coord]) -> f64 {
    cs.windows(2).map(|w| (w[1].vec2() - w[0].vec2()).norm()).sum()
}

pub fn area(g: &Geom) -> f64 {
    match &g.shape {
        Shape::Polygon(rings) => {
            let mut it = rings.iter().filter_map(|r| r.as_line().ok());
            let shell = it.next().map_or(0.0, |cs| ring_area(cs).abs());
            shell - it.map(|cs| ring_area(cs).abs()).sum::<f64>()
        }
        _ => g.members().map_or(0.0, |m| m.iter().map(area).sum()),
    }
}

pub fn length(g: &Geom) -> f64 {
    let mut total = 0.0;
    g.for_each_line(&mut |cs| total += seq_length(cs));
    total
}

/// Bounding box as a polygon, a point when degenerate, empty point when empty.
pub fn envelope(g: &Geom) -> Geom {
    let mut lo = Vector2::new(f64::INFINITY, f64::INFINITY);
    let mut hi = Vector2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    g.for_each_coord(&mut |c| {
        lo = lo.inf(&c.vec2());
        hi = hi.sup(&c.vec2());
    });
    let mut env = if lo.x > hi.x {
        Geom::new(Shape::Point(None), false)
    } else if lo == hi {
        Geom::point(Coord::xy(lo.x, lo.y))
    } else {
        Geom::polygon(vec![
            Coord::xy(lo.x, lo.y),
            Coord::xy(hi.x, lo.y),
            Coord::xy(hi.x, hi.y),
            Coord::xy(lo.x, hi.y),
            Coord::xy(lo.x, lo.y),
        ])
    };
    env.srid = g.srid;
    env
}

/// Stored state of a buffer parameter handle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferParamsData {
    pub quadrant_segments: i32,
    pub end_cap_style: i32,
    pub join_style: i32,
    pub mitre_limit: f64,
    pub single_sided: bool,
}

impl Default for BufferParamsData {
    fn default() -> Self {
        Self {
            quadrant_segments: 8,
            end_cap_style: 1,
            join_style: 1,
            mitre_limit: 5.0,
            single_sided: false,
        }
    }
}

/// Largest accepted `quadrant_segments`.
pub const MAX_QUADRANT_SEGMENTS: i32 = 4096;

/// Regular `4 * quadrant_segments`-gon around a point.
pub fn buffer(g: &Geom, params: &BufferParamsData, width: f64) -> Result<Geom, String> {
    let center = match &g.shape {
        Shape::Point(c) => *c,
        _ => {
            return Err(format!(
                "UnsupportedOperationException: buffer of {} is not supported by the reference engine",
                g.type_name()
            ))
        }
    };
    let mut out = match center {
        Some(c) if width > 0.0 => {
            let n = 4 * params.quadrant_segments.clamp(1, MAX_QUADRANT_SEGMENTS) as usize;
            let step = std::f64::consts::TAU / n as f64;
            let mut shell: Vec<Coord> = (0..n)
                .map(|i| {
                    let t = step * i as f64;
                    Coord::xy(c.x + width * t.cos(), c.y + width * t.sin())
                })
                .collect();
            shell.push(shell[0]);
            Geom::polygon(shell)
        }
        _ => Geom::empty_polygon(),
    };
    out.srid = g.srid;
    Ok(out)
}

/// Undirected line graph keyed by endpoint.
struct LineGraph {
    lines: Vec<Vec<Coord>>,
    incident: HashMap<(u64, u64), Vec<usize>>,
}

impl LineGraph {
    fn new(g: &Geom) -> Self {
        let mut lines = Vec::new();
        g.for_each_line(&mut |cs| {
            if cs.len() >= 2 {
                lines.push(cs.to_vec());
            }
        });
        let mut incident: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
        for (i, cs) in lines.iter().enumerate() {
            incident.entry(cs[0].key()).or_default().push(i);
            incident.entry(cs[cs.len() - 1].key()).or_default().push(i);
        }
        Self { lines, incident }
    }

    fn degree(&self, c: &Coord) -> usize {
        self.incident.get(&c.key()).map_or(0, Vec::len)
    }

    /// Maximal chains through degree-2 nodes, in input order.
    fn chains(&self) -> Vec<Vec<Coord>> {
        let mut used = vec![false; self.lines.len()];
        let mut out = Vec::new();
        for i in 0..self.lines.len() {
            if used[i] {
                continue;
            }
            let cs = &self.lines[i];
            if self.degree(&cs[0]) != 2 {
                out.push(self.walk(i, false, &mut used));
            } else if self.degree(&cs[cs.len() - 1]) != 2 {
                out.push(self.walk(i, true, &mut used));
            }
        }
        for i in 0..self.lines.len() {
            if !used[i] {
                out.push(self.walk(i, false, &mut used));
            }
        }
        out
    }

    fn walk(&self, first: usize, reversed: bool, used: &mut [bool]) -> Vec<Coord> {
        used[first] = true;
        let mut chain = self.lines[first].clone();
        if reversed {
            chain.reverse();
        }
        loop {
            let end = chain[chain.len() - 1];
            if self.degree(&end) != 2 {
                break;
            }
            let next = self.incident[&end.key()].iter().copied().find(|&j| !used[j]);
            let Some(j) = next else { break };
            used[j] = true;
            let mut seg = self.lines[j].clone();
            if !seg[0].same_xy(&end) {
                seg.reverse();
            }
            chain.extend_from_slice(&seg[1..]);
        }
        chain
    }
}

fn closed(cs: &[Coord]) -> bool {
    cs.len() >= 2 && cs[0].same_xy(&cs[cs.len() - 1])
}

pub struct Polygonized {
    pub rings: Geom,
    pub cut_edges: Geom,
    pub dangles: Geom,
    pub invalid_rings: Geom,
}

pub fn polygonize(g: &Geom) -> Polygonized {
    let graph = LineGraph::new(g);
    let (mut rings, mut cuts, mut dangles, mut invalid) = (vec![], vec![], vec![], vec![]);
    for chain in graph.chains() {
        if closed(&chain) {
            if chain.len() >= 4 && ring_area(&chain) != 0.0 {
                rings.push(Geom::polygon(chain));
            } else {
                invalid.push(Geom::line(chain));
            }
        } else if graph.degree(&chain[0]) == 1 || graph.degree(&chain[chain.len() - 1]) == 1 {
            dangles.push(Geom::line(chain));
        } else {
            cuts.push(Geom::line(chain));
        }
    }
    let wrap = |members: Vec<Geom>| {
        let mut c = Geom::collection(members, Shape::GeometryCollection);
        c.srid = g.srid;
        c
    };
    Polygonized {
        rings: wrap(rings),
        cut_edges: wrap(cuts),
        dangles: wrap(dangles),
        invalid_rings: wrap(invalid),
    }
}

/// One line when everything merges, a multi-line otherwise, an empty
/// collection for input without linework.
pub fn line_merge(g: &Geom) -> Geom {
    let mut merged: Vec<Geom> = LineGraph::new(g).chains().into_iter().map(Geom::line).collect();
    let mut out = match merged.len() {
        0 => Geom::collection(Vec::new(), Shape::GeometryCollection),
        1 => merged.remove(0),
        _ => Geom::collection(merged, Shape::MultiLineString),
    };
    out.srid = g.srid;
    out
}

fn is_lineal(g: &Geom) -> bool {
    matches!(
        g.shape,
        Shape::LineString(_) | Shape::LinearRing(_) | Shape::MultiLineString(_)
    )
}

/// Segments of `a` shared with `b`, split by relative direction.
pub fn shared_paths(a: &Geom, b: &Geom) -> Result<Geom, String> {
    if !is_lineal(a) || !is_lineal(b) {
        return Err("IllegalArgumentException: Geometry is not lineal".into());
    }
    let mut segments = HashSet::new();
    b.for_each_line(&mut |cs| {
        for w in cs.windows(2) {
            segments.insert((w[0].key(), w[1].key()));
        }
    });
    let mut forward: Vec<Vec<Coord>> = Vec::new();
    let mut backward: Vec<Vec<Coord>> = Vec::new();
    a.for_each_line(&mut |cs| {
        // 0 = not shared, 1 = forward, 2 = backward
        let mut last = 0u8;
        for w in cs.windows(2) {
            let (p, q) = (w[0].key(), w[1].key());
            let dir = if segments.contains(&(p, q)) {
                1
            } else if segments.contains(&(q, p)) {
                2
            } else {
                0
            };
            let runs = match dir {
                1 => &mut forward,
                2 => &mut backward,
                _ => {
                    last = 0;
                    continue;
                }
            };
            match runs.last_mut() {
                Some(run) if last == dir => run.push(w[1]),
                _ => runs.push(vec![w[0], w[1]]),
            }
            last = dir;
        }
    });
    let multi = |runs: Vec<Vec<Coord>>| {
        Geom::collection(runs.into_iter().map(Geom::line).collect(), Shape::MultiLineString)
    };
    let mut out = Geom::collection(vec![multi(forward), multi(backward)], Shape::GeometryCollection);
    out.srid = a.srid;
    Ok(out)
}

/// DE-9IM pattern match; errors when either string is malformed.
pub fn relate_pattern_match(matrix: &str, pattern: &str) -> Result<bool, String> {
    let m: Vec<char> = matrix.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    if m.len() != 9 || p.len() != 9 {
        return Err("IllegalArgumentException: Should be length 9".into());
    }
    let mut matched = true;
    for (&mc, &pc) in m.iter().zip(&p) {
        let mc = mc.to_ascii_uppercase();
        if !matches!(mc, '0' | '1' | '2' | 'F') {
            return Err(format!("IllegalArgumentException: Invalid dimension symbol: {mc}"));
        }
        matched &= match pc.to_ascii_uppercase() {
            '*' => true,
            'T' => mc != 'F',
            c @ ('0' | '1' | '2' | 'F') => c == mc,
            other => {
                return Err(format!("IllegalArgumentException: Invalid pattern symbol: {other}"))
            }
        };
    }
    Ok(matched)
}
