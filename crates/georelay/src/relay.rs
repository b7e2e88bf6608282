//! Relay binding between a wrapper value and one engine resource.
//!
//! State machine
//! - `Unbound` on construction, `Bound` exactly once through [`Relay::bind`],
//!   `Destroyed` after [`Relay::release`]. Release runs from `Drop`, calls the
//!   kind-specific destructor exactly once and is a no-op afterwards.
//! - The resource kind is fixed when the relay is created and checked on
//!   every [`Relay::resolve`], so a writer handle can never reach an engine
//!   call that expects a geometry.
//!
//! Ownership
//! - A bound relay is the only owner of its handle. `resolve` hands out the
//!   raw token for the duration of one engine call; it never clones the
//!   resource. Wrappers are move-only, so aliasing is ruled out statically.
//! - Each relay keeps its session alive; see `session`.

use std::fmt;

use crate::engine::{Engine, RawHandle};
use crate::error::{RelayError, Result};
use crate::session::Session;

/// Native resource type behind a relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Geometry,
    WkbWriter,
    WkbReader,
    WktReader,
    BufferParams,
}

impl ResourceKind {
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Geometry => "Geometry",
            ResourceKind::WkbWriter => "WKBWriter",
            ResourceKind::WkbReader => "WKBReader",
            ResourceKind::WktReader => "WKTReader",
            ResourceKind::BufferParams => "BufferParams",
        }
    }

    fn destroy(self, engine: &dyn Engine, h: RawHandle) {
        match self {
            ResourceKind::Geometry => engine.geom_destroy(h),
            ResourceKind::WkbWriter => engine.wkb_writer_destroy(h),
            ResourceKind::WkbReader => engine.wkb_reader_destroy(h),
            ResourceKind::WktReader => engine.wkt_reader_destroy(h),
            ResourceKind::BufferParams => engine.buffer_params_destroy(h),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundState {
    Unbound,
    Bound,
    Destroyed,
}

/// Owning link from a wrapper to one engine handle.
#[derive(Debug)]
pub struct Relay {
    kind: ResourceKind,
    session: Session,
    handle: Option<RawHandle>,
    state: BoundState,
}

impl Relay {
    pub(crate) fn new(session: &Session, kind: ResourceKind) -> Self {
        Self {
            kind,
            session: session.clone(),
            handle: None,
            state: BoundState::Unbound,
        }
    }

    /// Take ownership of `handle`.
    ///
    /// A second bind is a `ProtocolViolation`. The rejected handle is
    /// destroyed so it cannot leak, unless it is the handle this relay
    /// already owns.
    pub(crate) fn bind(&mut self, handle: RawHandle) -> Result<()> {
        if self.state != BoundState::Unbound {
            if self.handle != Some(handle) {
                self.kind.destroy(self.session.engine(), handle);
            }
            return Err(RelayError::protocol(format!(
                "{} relay bound twice (state {:?})",
                self.kind, self.state
            )));
        }
        self.handle = Some(handle);
        self.state = BoundState::Bound;
        Ok(())
    }

    /// Raw handle for one engine call, after the kind and state checks.
    pub fn resolve(&self, expected: ResourceKind) -> Result<RawHandle> {
        if self.kind != expected {
            return Err(RelayError::TypeMismatch {
                expected,
                found: self.kind,
            });
        }
        match (self.state, self.handle) {
            (BoundState::Bound, Some(h)) => Ok(h),
            _ => Err(RelayError::UnboundHandle { kind: self.kind }),
        }
    }

    /// Destroy the resource if bound; idempotent.
    pub(crate) fn release(&mut self) {
        if self.state != BoundState::Bound {
            return;
        }
        if let Some(h) = self.handle.take() {
            self.kind.destroy(self.session.engine(), h);
        }
        self.state = BoundState::Destroyed;
    }

    #[inline]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[inline]
    pub fn state(&self) -> BoundState {
        self.state
    }

    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.release();
    }
}

/// A value type that is nothing but a relay of a fixed kind.
pub trait Wrapper: Sized {
    const KIND: ResourceKind;

    fn relay(&self) -> &Relay;

    #[doc(hidden)]
    fn from_relay(relay: Relay) -> Self;

    fn session(&self) -> &Session {
        self.relay().session()
    }

    /// Handle behind this wrapper, checked against [`Self::KIND`].
    fn raw(&self) -> Result<RawHandle> {
        self.relay().resolve(Self::KIND)
    }
}

/// Check an engine return and bind it to a new wrapper.
pub(crate) fn adopt<W: Wrapper>(session: &Session, out: Option<RawHandle>) -> Result<W> {
    let handle = session.handle(out)?;
    let mut relay = Relay::new(session, W::KIND);
    relay.bind(handle)?;
    Ok(W::from_relay(relay))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::engine::memory::MemoryEngine;
    use crate::prelude::*;

    fn setup() -> (Rc<MemoryEngine>, Session) {
        let engine = Rc::new(MemoryEngine::new());
        let session = Session::open_shared(engine.clone()).unwrap();
        (engine, session)
    }

    #[test]
    fn destroyed_relay_fails_resolve_and_release_is_idempotent() {
        let (engine, session) = setup();
        let h = engine.wkb_writer_create().unwrap();
        let mut relay = Relay::new(&session, ResourceKind::WkbWriter);
        assert_eq!(
            relay.resolve(ResourceKind::WkbWriter),
            Err(RelayError::UnboundHandle {
                kind: ResourceKind::WkbWriter
            })
        );
        relay.bind(h).unwrap();
        assert_eq!(relay.resolve(ResourceKind::WkbWriter), Ok(h));
        assert_eq!(engine.live_handles(), 1);

        relay.release();
        assert_eq!(relay.state(), BoundState::Destroyed);
        assert_eq!(engine.live_handles(), 0);
        assert!(matches!(
            relay.resolve(ResourceKind::WkbWriter),
            Err(RelayError::UnboundHandle { .. })
        ));

        relay.release();
        drop(relay);
        // No destroy reached the engine twice.
        assert_eq!(session.notices(), 0);
    }

    #[test]
    fn writer_resolved_as_geometry_is_type_mismatch() {
        let (_engine, session) = setup();
        let writer = WkbWriter::new(&session).unwrap();
        assert_eq!(
            writer.relay().resolve(ResourceKind::Geometry),
            Err(RelayError::TypeMismatch {
                expected: ResourceKind::Geometry,
                found: ResourceKind::WkbWriter,
            })
        );
    }

    #[test]
    fn double_bind_is_protocol_violation_without_leak() {
        let (engine, session) = setup();
        let a = engine.wkt_reader_create().unwrap();
        let b = engine.wkt_reader_create().unwrap();
        let mut relay = Relay::new(&session, ResourceKind::WktReader);
        relay.bind(a).unwrap();
        assert!(matches!(
            relay.bind(b),
            Err(RelayError::ProtocolViolation { .. })
        ));
        // The rejected handle was destroyed; the bound one is untouched.
        assert_eq!(engine.live_handles(), 1);
        assert!(matches!(
            relay.bind(a),
            Err(RelayError::ProtocolViolation { .. })
        ));
        assert_eq!(relay.resolve(ResourceKind::WktReader), Ok(a));
        drop(relay);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn bind_after_destroy_is_rejected() {
        let (engine, session) = setup();
        let a = engine.wkb_reader_create().unwrap();
        let mut relay = Relay::new(&session, ResourceKind::WkbReader);
        relay.bind(a).unwrap();
        relay.release();
        let b = engine.wkb_reader_create().unwrap();
        assert!(relay.bind(b).is_err());
        assert_eq!(relay.state(), BoundState::Destroyed);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn adopt_propagates_sentinel_failures() {
        let (engine, session) = setup();
        let r = WktReader::new(&session).unwrap();
        let err = adopt::<Geometry>(&session, engine.wkt_reader_read(r.raw().unwrap(), "POINT (1"))
            .unwrap_err();
        assert!(matches!(err, RelayError::EngineFailure { .. }));
        assert_eq!(engine.live_handles(), 1);
    }
}
