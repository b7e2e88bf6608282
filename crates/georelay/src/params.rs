//! Buffer style marshaling.
//!
//! [`BufferStyle`] is the order-independent option set. Only fields that are
//! present are written to the native parameter object, so omitted options
//! keep the engine defaults (8 quadrant segments, round caps, round joins,
//! mitre limit 5.0, two-sided). The native object lives in a scoped
//! [`BufferParams`] guard and is destroyed right after the one call that
//! consumes it, on success and failure alike.

use std::fmt;

use crate::engine::{CAP_FLAT, CAP_ROUND, CAP_SQUARE, JOIN_BEVEL, JOIN_MITRE, JOIN_ROUND};
use crate::error::{RelayError, Result};
use crate::relay::{Relay, ResourceKind};
use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapStyle {
    Round,
    Flat,
    Square,
}

impl CapStyle {
    pub fn code(self) -> i32 {
        match self {
            CapStyle::Round => CAP_ROUND,
            CapStyle::Flat => CAP_FLAT,
            CapStyle::Square => CAP_SQUARE,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match i32::try_from(code).ok()? {
            CAP_ROUND => Some(CapStyle::Round),
            CAP_FLAT => Some(CapStyle::Flat),
            CAP_SQUARE => Some(CapStyle::Square),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "round" => Some(CapStyle::Round),
            "flat" | "butt" => Some(CapStyle::Flat),
            "square" => Some(CapStyle::Square),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinStyle {
    Round,
    Mitre,
    Bevel,
}

impl JoinStyle {
    pub fn code(self) -> i32 {
        match self {
            JoinStyle::Round => JOIN_ROUND,
            JoinStyle::Mitre => JOIN_MITRE,
            JoinStyle::Bevel => JOIN_BEVEL,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match i32::try_from(code).ok()? {
            JOIN_ROUND => Some(JoinStyle::Round),
            JOIN_MITRE => Some(JoinStyle::Mitre),
            JOIN_BEVEL => Some(JoinStyle::Bevel),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "round" => Some(JoinStyle::Round),
            "mitre" | "miter" => Some(JoinStyle::Mitre),
            "bevel" => Some(JoinStyle::Bevel),
            _ => None,
        }
    }
}

/// Loosely typed option value as received from a host.
#[derive(Clone, Debug, PartialEq)]
pub enum StyleValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl From<i64> for StyleValue {
    fn from(v: i64) -> Self {
        StyleValue::Int(v)
    }
}

impl From<i32> for StyleValue {
    fn from(v: i32) -> Self {
        StyleValue::Int(i64::from(v))
    }
}

impl From<f64> for StyleValue {
    fn from(v: f64) -> Self {
        StyleValue::Float(v)
    }
}

impl From<bool> for StyleValue {
    fn from(v: bool) -> Self {
        StyleValue::Bool(v)
    }
}

impl From<&str> for StyleValue {
    fn from(v: &str) -> Self {
        StyleValue::Text(v.to_string())
    }
}

impl From<String> for StyleValue {
    fn from(v: String) -> Self {
        StyleValue::Text(v)
    }
}

impl From<CapStyle> for StyleValue {
    fn from(v: CapStyle) -> Self {
        StyleValue::Int(i64::from(v.code()))
    }
}

impl From<JoinStyle> for StyleValue {
    fn from(v: JoinStyle) -> Self {
        StyleValue::Int(i64::from(v.code()))
    }
}

impl fmt::Display for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleValue::Int(v) => write!(f, "{v}"),
            StyleValue::Float(v) => write!(f, "{v}"),
            StyleValue::Bool(v) => write!(f, "{v}"),
            StyleValue::Text(v) => write!(f, "{v:?}"),
        }
    }
}

fn bad(key: &str, value: &StyleValue) -> RelayError {
    RelayError::malformed(format!("invalid value {value} for buffer option '{key}'"))
}

impl StyleValue {
    fn to_int(&self, key: &str) -> Result<i64> {
        match self {
            StyleValue::Int(v) => Ok(*v),
            StyleValue::Float(v) if v.is_finite() => Ok(v.trunc() as i64),
            StyleValue::Bool(v) => Ok(i64::from(*v)),
            StyleValue::Text(t) => t.trim().parse().map_err(|_| bad(key, self)),
            StyleValue::Float(_) => Err(bad(key, self)),
        }
    }

    fn to_float(&self, key: &str) -> Result<f64> {
        match self {
            StyleValue::Int(v) => Ok(*v as f64),
            StyleValue::Float(v) => Ok(*v),
            StyleValue::Bool(v) => Ok(f64::from(u8::from(*v))),
            StyleValue::Text(t) => t.trim().parse().map_err(|_| bad(key, self)),
        }
    }

    fn to_bool(&self, key: &str) -> Result<bool> {
        match self {
            StyleValue::Bool(v) => Ok(*v),
            StyleValue::Int(v) => Ok(*v != 0),
            StyleValue::Float(v) => Ok(*v != 0.0),
            StyleValue::Text(t) => match t.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" | "" => Ok(false),
                _ => Err(bad(key, self)),
            },
        }
    }
}

/// Buffer options; `None` keeps the engine default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BufferStyle {
    pub quad_segs: Option<i32>,
    pub endcap: Option<CapStyle>,
    pub join: Option<JoinStyle>,
    pub mitre_limit: Option<f64>,
    pub single_sided: Option<bool>,
}

impl BufferStyle {
    /// Collect recognized keys from a host option map; unknown keys are
    /// ignored. `miter_limit` is accepted for `mitre_limit`.
    pub fn from_options<I, K>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, StyleValue)>,
        K: AsRef<str>,
    {
        let mut style = BufferStyle::default();
        for (key, value) in options {
            let key = key.as_ref();
            match key {
                "quad_segs" => {
                    let n = value.to_int(key)?;
                    style.quad_segs = Some(i32::try_from(n).map_err(|_| bad(key, &value))?);
                }
                "endcap" => {
                    let cap = match &value {
                        StyleValue::Text(name) => CapStyle::from_name(name),
                        other => CapStyle::from_code(other.to_int(key)?),
                    };
                    style.endcap = Some(cap.ok_or_else(|| bad(key, &value))?);
                }
                "join" => {
                    let join = match &value {
                        StyleValue::Text(name) => JoinStyle::from_name(name),
                        other => JoinStyle::from_code(other.to_int(key)?),
                    };
                    style.join = Some(join.ok_or_else(|| bad(key, &value))?);
                }
                "mitre_limit" | "miter_limit" => style.mitre_limit = Some(value.to_float(key)?),
                "single_sided" => style.single_sided = Some(value.to_bool(key)?),
                _ => {}
            }
        }
        Ok(style)
    }

    pub fn quad_segs(mut self, n: i32) -> Self {
        self.quad_segs = Some(n);
        self
    }

    pub fn endcap(mut self, cap: CapStyle) -> Self {
        self.endcap = Some(cap);
        self
    }

    pub fn join(mut self, join: JoinStyle) -> Self {
        self.join = Some(join);
        self
    }

    pub fn mitre_limit(mut self, limit: f64) -> Self {
        self.mitre_limit = Some(limit);
        self
    }

    pub fn single_sided(mut self, on: bool) -> Self {
        self.single_sided = Some(on);
        self
    }
}

/// Native buffer parameter object, destroyed on drop.
pub(crate) struct BufferParams {
    relay: Relay,
}

impl BufferParams {
    pub(crate) fn build(session: &Session, style: &BufferStyle) -> Result<Self> {
        let engine = session.engine();
        let raw = session.handle(engine.buffer_params_create())?;
        let mut relay = Relay::new(session, ResourceKind::BufferParams);
        relay.bind(raw)?;
        // From here on `relay` releases the object if a setter fails.
        if let Some(n) = style.quad_segs {
            session.status(engine.buffer_params_set_quadrant_segments(raw, n))?;
        }
        if let Some(cap) = style.endcap {
            session.status(engine.buffer_params_set_end_cap_style(raw, cap.code()))?;
        }
        if let Some(join) = style.join {
            session.status(engine.buffer_params_set_join_style(raw, join.code()))?;
        }
        if let Some(limit) = style.mitre_limit {
            session.status(engine.buffer_params_set_mitre_limit(raw, limit))?;
        }
        if let Some(on) = style.single_sided {
            session.status(engine.buffer_params_set_single_sided(raw, on))?;
        }
        Ok(Self { relay })
    }

    pub(crate) fn raw(&self) -> Result<crate::engine::RawHandle> {
        self.relay.resolve(ResourceKind::BufferParams)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::engine::memory::{BufferParamsData, MemoryEngine};

    fn opts(pairs: &[(&str, StyleValue)]) -> Result<BufferStyle> {
        BufferStyle::from_options(pairs.iter().cloned())
    }

    #[test]
    fn partial_options_keep_engine_defaults() {
        let engine = Rc::new(MemoryEngine::new());
        let session = Session::open_shared(engine.clone()).unwrap();
        let style = opts(&[
            ("quad_segs", StyleValue::Int(4)),
            ("join", JoinStyle::Mitre.into()),
            ("mitre_limit", StyleValue::Float(2.0)),
        ])
        .unwrap();
        let params = BufferParams::build(&session, &style).unwrap();
        let data = engine.buffer_params(params.raw().unwrap()).unwrap();
        assert_eq!(
            data,
            BufferParamsData {
                quadrant_segments: 4,
                end_cap_style: CAP_ROUND,
                join_style: JOIN_MITRE,
                mitre_limit: 2.0,
                single_sided: false,
            }
        );
        drop(params);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn option_order_does_not_matter() {
        let a = opts(&[("endcap", "square".into()), ("single_sided", true.into())]).unwrap();
        let b = opts(&[("single_sided", StyleValue::Int(1)), ("endcap", StyleValue::Int(3))]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.endcap, Some(CapStyle::Square));
    }

    #[test]
    fn miter_spelling_and_unknown_keys() {
        let style = opts(&[
            ("miter_limit", "3.5".into()),
            ("join", "miter".into()),
            ("colour", "red".into()),
        ])
        .unwrap();
        assert_eq!(style.mitre_limit, Some(3.5));
        assert_eq!(style.join, Some(JoinStyle::Mitre));
        assert_eq!(style.quad_segs, None);
    }

    #[test]
    fn bad_codes_are_malformed_input() {
        for pairs in [
            vec![("endcap", StyleValue::Int(9))],
            vec![("join", StyleValue::from("zigzag"))],
            vec![("quad_segs", StyleValue::from("many"))],
            vec![("single_sided", StyleValue::from("maybe"))],
        ] {
            assert!(matches!(opts(&pairs), Err(RelayError::MalformedInput { .. })));
        }
    }

    #[test]
    fn params_object_is_released_after_use() {
        let engine = Rc::new(MemoryEngine::new());
        let session = Session::open_shared(engine.clone()).unwrap();
        let style = BufferStyle::default().endcap(CapStyle::Flat).single_sided(true);
        let params = BufferParams::build(&session, &style).unwrap();
        let raw = params.raw().unwrap();
        let data = engine.buffer_params(raw).unwrap();
        assert_eq!((data.end_cap_style, data.single_sided), (CAP_FLAT, true));
        assert_eq!(data.quadrant_segments, 8);
        drop(params);
        assert_eq!(engine.buffer_params(raw), None);
        assert_eq!(session.notices(), 0);
    }

    #[test]
    fn oversized_quadrant_segments_fail_in_the_engine() {
        let engine = Rc::new(MemoryEngine::new());
        let session = Session::open_shared(engine.clone()).unwrap();
        let g = crate::codec::WktReader::new(&session)
            .unwrap()
            .read("POINT (0 0)")
            .unwrap();
        let style = opts(&[("quad_segs", StyleValue::Int(i64::from(i32::MAX)))]).unwrap();
        assert!(matches!(
            g.buffer(1.0, &style),
            Err(RelayError::EngineFailure { message }) if message.contains("quadrant segments")
        ));
        drop(g);
        // The rejected params object was released with its relay.
        assert_eq!(engine.live_handles(), 0);
    }
}
