//! Codec bridge: well-known binary / hex / text in and out of the engine.
//!
//! Two ways in
//! - Explicit: [`WkbWriter`], [`WkbReader`] and [`WktReader`] wrappers, each
//!   relay-bound to its own engine object and configurable per instance.
//! - Implicit: [`Session::encode`] / [`Session::decode`] (and the hex
//!   variants) go through the session codec pair, created on first use
//!   with 3-D output and embedded SRID. `serde::Serialize` for [`Geometry`]
//!   and [`GeometrySeed`] use the hex form as the payload.
//!
//! Decoding failures are reported as `MalformedInput`.

use serde::de::{DeserializeSeed, Deserializer, Error as _};
use serde::ser::{Error as _, Serialize, Serializer};
use serde::Deserialize;

use crate::engine::{BYTE_ORDER_BIG, BYTE_ORDER_LITTLE};
use crate::error::{RelayError, Result};
use crate::geometry::Geometry;
use crate::relay::{adopt, Relay, ResourceKind, Wrapper};
use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    /// XDR
    Big,
    /// NDR
    Little,
}

impl ByteOrder {
    pub fn code(self) -> i32 {
        match self {
            ByteOrder::Big => BYTE_ORDER_BIG,
            ByteOrder::Little => BYTE_ORDER_LITTLE,
        }
    }
}

/// Binary writer with its own output settings.
#[derive(Debug)]
pub struct WkbWriter {
    relay: Relay,
}

impl Wrapper for WkbWriter {
    const KIND: ResourceKind = ResourceKind::WkbWriter;

    fn relay(&self) -> &Relay {
        &self.relay
    }

    fn from_relay(relay: Relay) -> Self {
        Self { relay }
    }
}

impl WkbWriter {
    pub fn new(session: &Session) -> Result<Self> {
        adopt(session, session.engine().wkb_writer_create())
    }

    pub fn output_dimension(&self) -> Result<usize> {
        let w = self.raw()?;
        self.session()
            .count(self.session().engine().wkb_writer_get_output_dimension(w))
    }

    /// 2 or 3; the engine rejects anything else.
    pub fn set_output_dimension(&mut self, dimension: u8) -> Result<()> {
        let w = self.raw()?;
        self.session().status(
            self.session()
                .engine()
                .wkb_writer_set_output_dimension(w, i32::from(dimension)),
        )
    }

    pub fn byte_order(&self) -> Result<ByteOrder> {
        let w = self.raw()?;
        match self.session().count(self.session().engine().wkb_writer_get_byte_order(w))? {
            0 => Ok(ByteOrder::Big),
            1 => Ok(ByteOrder::Little),
            other => Err(RelayError::engine(format!("unknown byte order {other}"))),
        }
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) -> Result<()> {
        let w = self.raw()?;
        self.session()
            .status(self.session().engine().wkb_writer_set_byte_order(w, order.code()))
    }

    pub fn include_srid(&self) -> Result<bool> {
        let w = self.raw()?;
        self.session()
            .decide(self.session().engine().wkb_writer_get_include_srid(w))
    }

    pub fn set_include_srid(&mut self, include: bool) -> Result<()> {
        let w = self.raw()?;
        self.session()
            .status(self.session().engine().wkb_writer_set_include_srid(w, include))
    }

    pub fn write(&self, g: &Geometry) -> Result<Vec<u8>> {
        self.session().ensure_same(g.session())?;
        let (w, raw) = (self.raw()?, g.raw()?);
        self.session()
            .value(self.session().engine().wkb_writer_write(w, raw))
    }

    /// Upper-case hex expansion of [`WkbWriter::write`].
    pub fn write_hex(&self, g: &Geometry) -> Result<String> {
        self.session().ensure_same(g.session())?;
        let (w, raw) = (self.raw()?, g.raw()?);
        self.session()
            .value(self.session().engine().wkb_writer_write_hex(w, raw))
    }
}

#[derive(Debug)]
pub struct WkbReader {
    relay: Relay,
}

impl Wrapper for WkbReader {
    const KIND: ResourceKind = ResourceKind::WkbReader;

    fn relay(&self) -> &Relay {
        &self.relay
    }

    fn from_relay(relay: Relay) -> Self {
        Self { relay }
    }
}

impl WkbReader {
    pub fn new(session: &Session) -> Result<Self> {
        adopt(session, session.engine().wkb_reader_create())
    }

    pub fn read(&self, bytes: &[u8]) -> Result<Geometry> {
        let r = self.raw()?;
        adopt(self.session(), self.session().engine().wkb_reader_read(r, bytes))
            .map_err(RelayError::into_malformed)
    }

    /// Hex input in either case.
    pub fn read_hex(&self, text: &str) -> Result<Geometry> {
        let r = self.raw()?;
        adopt(
            self.session(),
            self.session().engine().wkb_reader_read_hex(r, text.as_bytes()),
        )
        .map_err(RelayError::into_malformed)
    }
}

#[derive(Debug)]
pub struct WktReader {
    relay: Relay,
}

impl Wrapper for WktReader {
    const KIND: ResourceKind = ResourceKind::WktReader;

    fn relay(&self) -> &Relay {
        &self.relay
    }

    fn from_relay(relay: Relay) -> Self {
        Self { relay }
    }
}

impl WktReader {
    pub fn new(session: &Session) -> Result<Self> {
        adopt(session, session.engine().wkt_reader_create())
    }

    pub fn read(&self, text: &str) -> Result<Geometry> {
        let r = self.raw()?;
        adopt(self.session(), self.session().engine().wkt_reader_read(r, text))
            .map_err(RelayError::into_malformed)
    }
}

impl Session {
    /// Canonical binary form through the session writer.
    pub fn encode(&self, g: &Geometry) -> Result<Vec<u8>> {
        self.ensure_same(g.session())?;
        let raw = g.raw()?;
        let w = self.codec_writer()?;
        self.value(self.engine().wkb_writer_write(w, raw))
    }

    /// Canonical string form: upper-case hex of [`Session::encode`].
    pub fn encode_hex(&self, g: &Geometry) -> Result<String> {
        self.ensure_same(g.session())?;
        let raw = g.raw()?;
        let w = self.codec_writer()?;
        self.value(self.engine().wkb_writer_write_hex(w, raw))
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Geometry> {
        let r = self.codec_reader()?;
        adopt(self, self.engine().wkb_reader_read(r, bytes)).map_err(RelayError::into_malformed)
    }

    pub fn decode_hex(&self, text: &str) -> Result<Geometry> {
        let r = self.codec_reader()?;
        adopt(self, self.engine().wkb_reader_read_hex(r, text.as_bytes()))
            .map_err(RelayError::into_malformed)
    }

    /// Restore a serialized wrapper of `kind`; only geometries carry state.
    pub fn unserialize(&self, kind: ResourceKind, payload: &str) -> Result<Geometry> {
        if kind != ResourceKind::Geometry {
            return Err(RelayError::TypeMismatch {
                expected: ResourceKind::Geometry,
                found: kind,
            });
        }
        self.decode_hex(payload)
    }
}

impl Serialize for Geometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let hex = self.session().encode_hex(self).map_err(S::Error::custom)?;
        serializer.serialize_str(&hex)
    }
}

/// Deserializes a hex payload into a geometry owned by the given session.
#[derive(Clone, Copy, Debug)]
pub struct GeometrySeed<'a>(pub &'a Session);

impl<'de> DeserializeSeed<'de> for GeometrySeed<'_> {
    type Value = Geometry;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Geometry, D::Error> {
        let hex = String::deserialize(deserializer)?;
        self.0.unserialize(ResourceKind::Geometry, &hex).map_err(D::Error::custom)
    }
}
