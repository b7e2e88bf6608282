//! Well-known text reader and trimmed writer for the reference engine.
//!
//! Reader accepts the eight OGC geometry tags, `EMPTY`, and an optional `Z`
//! tag; a third ordinate without a tag also marks the geometry as 3-D.
//! Writer emits the trimmed form: shortest round-trip numbers, a space
//! between tag and body, members of multi-points parenthesised.

use std::fmt::Write as _;

use super::geom::{too_deep, Coord, Geom, Shape, MAX_DEPTH};

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Number(f64),
    Open,
    Close,
    Comma,
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut out = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                out.push(Token::Open);
            }
            ')' => {
                chars.next();
                out.push(Token::Close);
            }
            ',' => {
                chars.next();
                out.push(Token::Comma);
            }
            c if c.is_ascii_alphabetic() => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !c.is_ascii_alphanumeric() {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                out.push(Token::Word(text[start..end].to_ascii_uppercase()));
            }
            c if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    let prev_exp = text[start..end].ends_with(['e', 'E']);
                    let sign_ok = matches!(c, '-' | '+') && (i == start || prev_exp);
                    if !(c.is_ascii_digit() || c == '.' || matches!(c, 'e' | 'E') || sign_ok) {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                let lexeme = &text[start..end];
                let value = lexeme
                    .parse::<f64>()
                    .map_err(|_| format!("ParseException: Unexpected number: {lexeme}"))?;
                out.push(Token::Number(value));
            }
            other => return Err(format!("ParseException: Unexpected character '{other}'")),
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open `GEOMETRYCOLLECTION` bodies.
    depth: usize,
}

/// Parse one geometry; trailing tokens are an error.
pub fn parse(text: &str) -> Result<Geom, String> {
    let mut p = Parser {
        tokens: tokenize(text)?,
        pos: 0,
        depth: 0,
    };
    let g = p.geometry()?;
    if p.pos != p.tokens.len() {
        return Err("ParseException: Unexpected text after end of geometry".into());
    }
    Ok(g)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, String> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| String::from("ParseException: Expected word but encountered end of stream"))?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, want: Token) -> Result<(), String> {
        let got = self.next()?;
        if got == want {
            Ok(())
        } else {
            Err(format!("ParseException: Expected {want:?} but encountered {got:?}"))
        }
    }

    fn eat(&mut self, want: &Token) -> bool {
        if self.peek() == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        match self.peek() {
            Some(Token::Word(w)) if w == word => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn geometry(&mut self) -> Result<Geom, String> {
        let tag = match self.next()? {
            Token::Word(w) => w,
            other => return Err(format!("ParseException: Expected word but encountered {other:?}")),
        };
        let mut z = false;
        if self.eat_word("Z") {
            z = true;
        } else if matches!(self.peek(), Some(Token::Word(w)) if w == "M" || w == "ZM") {
            return Err("ParseException: M coordinates are not supported".into());
        }
        let empty = self.eat_word("EMPTY");
        let g = match tag.as_str() {
            "POINT" => {
                if empty {
                    Geom::new(Shape::Point(None), z)
                } else {
                    self.expect(Token::Open)?;
                    let c = self.coord(z)?;
                    self.expect(Token::Close)?;
                    Geom::point(c)
                }
            }
            "LINESTRING" => {
                let cs = if empty { Vec::new() } else { self.coords(z)? };
                line_checked(cs, z)?
            }
            "LINEARRING" => {
                let cs = if empty { Vec::new() } else { self.coords(z)? };
                ring_checked(cs, z)?
            }
            "POLYGON" => {
                if empty {
                    Geom::new(Shape::Polygon(Vec::new()), z)
                } else {
                    self.polygon_body(z)?
                }
            }
            "MULTIPOINT" => {
                let members = if empty { Vec::new() } else { self.multipoint_body(z)? };
                collection(members, Shape::MultiPoint, z)?
            }
            "MULTILINESTRING" => {
                let members = if empty {
                    Vec::new()
                } else {
                    self.list(|p| {
                        if p.eat_word("EMPTY") {
                            return Ok(Geom::new(Shape::LineString(Vec::new()), z));
                        }
                        let cs = p.coords(z)?;
                        line_checked(cs, z)
                    })?
                };
                collection(members, Shape::MultiLineString, z)?
            }
            "MULTIPOLYGON" => {
                let members = if empty {
                    Vec::new()
                } else {
                    self.list(|p| {
                        if p.eat_word("EMPTY") {
                            return Ok(Geom::new(Shape::Polygon(Vec::new()), z));
                        }
                        p.polygon_body(z)
                    })?
                };
                collection(members, Shape::MultiPolygon, z)?
            }
            "GEOMETRYCOLLECTION" => {
                let members = if empty {
                    Vec::new()
                } else {
                    if self.depth >= MAX_DEPTH {
                        return Err(too_deep());
                    }
                    self.depth += 1;
                    let members = self.list(Parser::geometry);
                    self.depth -= 1;
                    members?
                };
                collection(members, Shape::GeometryCollection, z)?
            }
            other => return Err(format!("ParseException: Unknown type: '{other}'")),
        };
        Ok(g)
    }

    /// `( item, item, ... )`
    fn list<T>(&mut self, mut item: impl FnMut(&mut Parser) -> Result<T, String>) -> Result<Vec<T>, String> {
        self.expect(Token::Open)?;
        let mut out = vec![item(self)?];
        while self.eat(&Token::Comma) {
            out.push(item(self)?);
        }
        self.expect(Token::Close)?;
        Ok(out)
    }

    fn coord(&mut self, z_tag: bool) -> Result<Coord, String> {
        let mut vals = Vec::with_capacity(3);
        while let Some(Token::Number(v)) = self.peek() {
            vals.push(*v);
            self.pos += 1;
        }
        match (vals.as_slice(), z_tag) {
            ([x, y], false) => Ok(Coord::xy(*x, *y)),
            ([x, y, z], _) => Ok(Coord::xyz(*x, *y, *z)),
            ([_, _], true) => Err("ParseException: Expected number but encountered ')'".into()),
            _ => Err(format!(
                "ParseException: Expected 2 or 3 ordinates but found {}",
                vals.len()
            )),
        }
    }

    fn coords(&mut self, z_tag: bool) -> Result<Vec<Coord>, String> {
        let cs = self.list(|p| p.coord(z_tag))?;
        let dims = cs[0].z.is_some();
        if cs.iter().any(|c| c.z.is_some() != dims) {
            return Err("ParseException: inconsistent coordinate dimension".into());
        }
        Ok(cs)
    }

    fn polygon_body(&mut self, z: bool) -> Result<Geom, String> {
        let rings = self.list(|p| {
            let cs = p.coords(z)?;
            ring_checked(cs, z)
        })?;
        same_dimension(&rings)?;
        let has_z = z || rings.iter().any(|r| r.has_z);
        Ok(Geom::new(Shape::Polygon(rings), has_z))
    }

    /// Accepts `(1 2, 3 4)` and `((1 2), (3 4), EMPTY)`.
    fn multipoint_body(&mut self, z: bool) -> Result<Vec<Geom>, String> {
        self.list(|p| {
            if p.eat_word("EMPTY") {
                return Ok(Geom::new(Shape::Point(None), z));
            }
            if p.eat(&Token::Open) {
                let c = p.coord(z)?;
                p.expect(Token::Close)?;
                return Ok(Geom::point(c));
            }
            Ok(Geom::point(p.coord(z)?))
        })
    }
}

fn collection(members: Vec<Geom>, make: fn(Vec<Geom>) -> Shape, z: bool) -> Result<Geom, String> {
    same_dimension(&members)?;
    let mut g = Geom::collection(members, make);
    g.has_z |= z;
    Ok(g)
}

/// Non-empty parts must agree on 2-D vs 3-D, as coordinates within one
/// sequence must.
pub(super) fn same_dimension(parts: &[Geom]) -> Result<(), String> {
    let mut dims = parts.iter().filter(|g| !g.is_empty()).map(|g| g.has_z);
    if let Some(first) = dims.next() {
        if dims.any(|d| d != first) {
            return Err("ParseException: inconsistent coordinate dimension".into());
        }
    }
    Ok(())
}

pub(super) fn line_checked(cs: Vec<Coord>, z: bool) -> Result<Geom, String> {
    if cs.len() == 1 {
        return Err("IllegalArgumentException: point array must contain 0 or >1 elements".into());
    }
    let mut g = Geom::line(cs);
    g.has_z |= z;
    Ok(g)
}

pub(super) fn ring_checked(cs: Vec<Coord>, z: bool) -> Result<Geom, String> {
    if let (Some(first), Some(last)) = (cs.first(), cs.last()) {
        if !first.same_xy(last) {
            return Err(
                "IllegalArgumentException: Points of LinearRing do not form a closed linestring".into(),
            );
        }
        if cs.len() < 4 {
            return Err(format!(
                "IllegalArgumentException: Invalid number of points in LinearRing found {} - must be 0 or >= 4",
                cs.len()
            ));
        }
    }
    let mut g = Geom::ring(cs);
    g.has_z |= z;
    Ok(g)
}

/// Trimmed WKT of `g`.
pub fn write(g: &Geom) -> String {
    let mut out = String::new();
    write_tagged(&mut out, g);
    out
}

fn write_tagged(out: &mut String, g: &Geom) {
    out.push_str(&g.type_name().to_ascii_uppercase());
    if g.has_z {
        out.push_str(" Z");
    }
    out.push(' ');
    write_body(out, g);
}

fn write_body(out: &mut String, g: &Geom) {
    let bare = match &g.shape {
        Shape::Point(c) => c.is_none(),
        Shape::LineString(cs) | Shape::LinearRing(cs) => cs.is_empty(),
        Shape::Polygon(parts) => parts.is_empty(),
        _ => g.members().map_or(true, <[Geom]>::is_empty),
    };
    if bare {
        out.push_str("EMPTY");
        return;
    }
    match &g.shape {
        Shape::Point(Some(c)) => {
            out.push('(');
            write_coord(out, c);
            out.push(')');
        }
        Shape::Point(None) => {}
        Shape::LineString(cs) | Shape::LinearRing(cs) => write_seq(out, cs),
        Shape::Polygon(parts)
        | Shape::MultiPoint(parts)
        | Shape::MultiLineString(parts)
        | Shape::MultiPolygon(parts) => {
            out.push('(');
            for (i, member) in parts.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_body(out, member);
            }
            out.push(')');
        }
        Shape::GeometryCollection(members) => {
            out.push('(');
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_tagged(out, member);
            }
            out.push(')');
        }
    }
}

fn write_seq(out: &mut String, cs: &[Coord]) {
    out.push('(');
    for (i, c) in cs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_coord(out, c);
    }
    out.push(')');
}

fn write_coord(out: &mut String, c: &Coord) {
    let _ = write!(out, "{} {}", c.x, c.y);
    if let Some(z) = c.z {
        let _ = write!(out, " {z}");
    }
}
