//! Extended well-known binary for the reference engine.
//!
//! - Type word flags: `0x8000_0000` Z, `0x4000_0000` M (rejected),
//!   `0x2000_0000` SRID follows. ISO codes (`1001..=1007`) are read as Z.
//! - The SRID is written only on the outermost geometry.
//! - An empty point is written as `NaN NaN` and read back as empty.
//! - Linear rings are written with the line-string type code.

use super::geom::{too_deep, Coord, Geom, Shape, MAX_DEPTH};
use super::wkt::{line_checked, ring_checked, same_dimension};

const FLAG_Z: u32 = 0x8000_0000;
const FLAG_M: u32 = 0x4000_0000;
const FLAG_SRID: u32 = 0x2000_0000;

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOINT: u32 = 4;
const WKB_MULTILINESTRING: u32 = 5;
const WKB_MULTIPOLYGON: u32 = 6;
const WKB_GEOMETRYCOLLECTION: u32 = 7;

/// Writer configuration stored behind a writer handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterCfg {
    /// 0 = big endian (XDR), 1 = little endian (NDR).
    pub byte_order: i32,
    pub output_dimension: i32,
    pub include_srid: bool,
}

impl Default for WriterCfg {
    fn default() -> Self {
        Self {
            byte_order: 1,
            output_dimension: 2,
            include_srid: false,
        }
    }
}

pub fn write(g: &Geom, cfg: &WriterCfg) -> Vec<u8> {
    let mut out = Vec::with_capacity(32);
    write_geom(&mut out, g, cfg, true);
    out
}

fn put_u32(out: &mut Vec<u8>, v: u32, big: bool) {
    if big {
        out.extend_from_slice(&v.to_be_bytes());
    } else {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn put_f64(out: &mut Vec<u8>, v: f64, big: bool) {
    if big {
        out.extend_from_slice(&v.to_be_bytes());
    } else {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

fn put_len(out: &mut Vec<u8>, n: usize, big: bool) {
    put_u32(out, u32::try_from(n).unwrap_or(u32::MAX), big);
}

fn write_geom(out: &mut Vec<u8>, g: &Geom, cfg: &WriterCfg, top: bool) {
    let big = cfg.byte_order == 0;
    let z = cfg.output_dimension == 3 && g.has_z;
    out.push(u8::from(!big));
    let code = match g.shape {
        Shape::Point(_) => WKB_POINT,
        Shape::LineString(_) | Shape::LinearRing(_) => WKB_LINESTRING,
        Shape::Polygon(_) => WKB_POLYGON,
        Shape::MultiPoint(_) => WKB_MULTIPOINT,
        Shape::MultiLineString(_) => WKB_MULTILINESTRING,
        Shape::MultiPolygon(_) => WKB_MULTIPOLYGON,
        Shape::GeometryCollection(_) => WKB_GEOMETRYCOLLECTION,
    };
    let with_srid = top && cfg.include_srid && g.srid != 0;
    let mut word = code;
    if z {
        word |= FLAG_Z;
    }
    if with_srid {
        word |= FLAG_SRID;
    }
    put_u32(out, word, big);
    if with_srid {
        put_u32(out, g.srid as u32, big);
    }
    let coord = |out: &mut Vec<u8>, c: &Coord| {
        put_f64(out, c.x, big);
        put_f64(out, c.y, big);
        if z {
            put_f64(out, c.z.unwrap_or(f64::NAN), big);
        }
    };
    match &g.shape {
        Shape::Point(Some(c)) => coord(&mut *out, c),
        Shape::Point(None) => coord(&mut *out, &Coord::xyz(f64::NAN, f64::NAN, f64::NAN)),
        Shape::LineString(cs) | Shape::LinearRing(cs) => {
            put_len(out, cs.len(), big);
            for c in cs {
                coord(&mut *out, c);
            }
        }
        Shape::Polygon(rings) => {
            put_len(out, rings.len(), big);
            for ring in rings {
                let cs = ring.as_line().unwrap_or_default();
                put_len(out, cs.len(), big);
                for c in cs {
                    coord(&mut *out, c);
                }
            }
        }
        Shape::MultiPoint(m)
        | Shape::MultiLineString(m)
        | Shape::MultiPolygon(m)
        | Shape::GeometryCollection(m) => {
            put_len(out, m.len(), big);
            for member in m {
                write_geom(out, member, cfg, false);
            }
        }
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len());
        match end {
            Some(end) => {
                let s = &self.buf[self.pos..end];
                self.pos = end;
                Ok(s)
            }
            None => Err("ParseException: Unexpected EOF parsing WKB".into()),
        }
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self, big: bool) -> Result<u32, String> {
        let mut b = [0u8; 4];
        b.copy_from_slice(self.take(4)?);
        Ok(if big { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) })
    }

    fn f64(&mut self, big: bool) -> Result<f64, String> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(if big { f64::from_be_bytes(b) } else { f64::from_le_bytes(b) })
    }

    /// Element count, bounded by the remaining input so corrupt counts fail fast.
    fn count(&mut self, big: bool, min_elem: usize) -> Result<usize, String> {
        let n = self.u32(big)? as usize;
        let remaining = self.buf.len() - self.pos;
        if n.saturating_mul(min_elem) > remaining {
            return Err("ParseException: Unexpected EOF parsing WKB".into());
        }
        Ok(n)
    }
}

pub fn read(buf: &[u8]) -> Result<Geom, String> {
    let mut cur = Cursor { buf, pos: 0 };
    let g = read_geom(&mut cur, 0)?;
    if cur.pos != buf.len() {
        return Err(format!(
            "ParseException: {} trailing bytes after WKB geometry",
            buf.len() - cur.pos
        ));
    }
    Ok(g)
}

pub fn read_hex(text: &[u8]) -> Result<Geom, String> {
    let bytes = hex::decode(text).map_err(|e| format!("ParseException: Invalid HEX input: {e}"))?;
    read(&bytes)
}

fn read_geom(cur: &mut Cursor<'_>, depth: usize) -> Result<Geom, String> {
    if depth > MAX_DEPTH {
        return Err(too_deep());
    }
    let big = match cur.u8()? {
        0 => true,
        1 => false,
        other => return Err(format!("ParseException: Unknown WKB byte order {other}")),
    };
    let word = cur.u32(big)?;
    if word & FLAG_M != 0 {
        return Err("ParseException: M coordinates are not supported".into());
    }
    let srid = if word & FLAG_SRID != 0 {
        Some(cur.u32(big)? as i32)
    } else {
        None
    };
    let base = word & 0x0FFF_FFFF;
    let (code, z) = match base / 1000 {
        0 => (base, word & FLAG_Z != 0),
        1 => (base % 1000, true),
        _ => return Err("ParseException: M coordinates are not supported".into()),
    };
    let dims = if z { 3 } else { 2 };
    let coord = |cur: &mut Cursor<'_>| -> Result<Coord, String> {
        let x = cur.f64(big)?;
        let y = cur.f64(big)?;
        Ok(if z {
            Coord::xyz(x, y, cur.f64(big)?)
        } else {
            Coord::xy(x, y)
        })
    };
    let seq = |cur: &mut Cursor<'_>| -> Result<Vec<Coord>, String> {
        let n = cur.count(big, 8 * dims)?;
        let mut cs = Vec::with_capacity(n);
        for _ in 0..n {
            cs.push(coord(&mut *cur)?);
        }
        Ok(cs)
    };
    let mut g = match code {
        WKB_POINT => {
            let c = coord(&mut *cur)?;
            if c.x.is_nan() && c.y.is_nan() {
                Geom::new(Shape::Point(None), z)
            } else {
                Geom::point(c)
            }
        }
        WKB_LINESTRING => line_checked(seq(&mut *cur)?, z)?,
        WKB_POLYGON => {
            let n = cur.count(big, 4)?;
            let mut rings = Vec::with_capacity(n);
            for _ in 0..n {
                rings.push(ring_checked(seq(&mut *cur)?, z)?);
            }
            Geom::new(Shape::Polygon(rings), z)
        }
        WKB_MULTIPOINT | WKB_MULTILINESTRING | WKB_MULTIPOLYGON | WKB_GEOMETRYCOLLECTION => {
            let n = cur.count(big, 5)?;
            let mut members = Vec::with_capacity(n);
            for _ in 0..n {
                members.push(read_geom(cur, depth + 1)?);
            }
            let expected = match code {
                WKB_MULTIPOINT => Some(WKB_POINT),
                WKB_MULTILINESTRING => Some(WKB_LINESTRING),
                WKB_MULTIPOLYGON => Some(WKB_POLYGON),
                _ => None,
            };
            same_dimension(&members)?;
            if let Some(want) = expected {
                let ok = members.iter().all(|m| match want {
                    WKB_POINT => matches!(m.shape, Shape::Point(_)),
                    WKB_LINESTRING => matches!(m.shape, Shape::LineString(_)),
                    _ => matches!(m.shape, Shape::Polygon(_)),
                });
                if !ok {
                    return Err("ParseException: Invalid member type in WKB collection".into());
                }
            }
            let make: fn(Vec<Geom>) -> Shape = match code {
                WKB_MULTIPOINT => Shape::MultiPoint,
                WKB_MULTILINESTRING => Shape::MultiLineString,
                WKB_MULTIPOLYGON => Shape::MultiPolygon,
                _ => Shape::GeometryCollection,
            };
            let mut g = Geom::collection(members, make);
            g.has_z |= z;
            g
        }
        other => return Err(format!("ParseException: Unknown WKB type {other}")),
    };
    if let Some(srid) = srid {
        g.srid = srid;
    }
    Ok(g)
}
