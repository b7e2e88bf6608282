//! Engine session: one per unit of work.
//!
//! Purpose
//! - Own the engine for the duration of a unit of work and install its two
//!   message callbacks: notices go to `tracing`, errors land in a pending slot
//!   drained by the check step after every engine call (see `bridge`).
//! - Own the lazily created codec pair (binary writer + reader) used by
//!   implicit serialization, and destroy it exactly once at close.
//!
//! Lifetime
//! - `Session` is a cheap `Rc` handle and deliberately `!Send`. Every wrapper
//!   keeps a clone, so the engine is finished only after the last wrapper is
//!   released, never while a handle is still live.
//! - One session per engine at a time; the callbacks installed at open are
//!   cleared only by the session that installed them.
//! - Callbacks fire synchronously inside the engine call that raised them.
//!   Only one engine call may be in flight per session.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::engine::{Engine, RawHandle, STATUS_OK};
use crate::error::{RelayError, Result};

/// Configuration of the session serializer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecCfg {
    /// 2 or 3.
    pub output_dimension: u8,
    pub include_srid: bool,
}

impl Default for CodecCfg {
    fn default() -> Self {
        Self {
            output_dimension: 3,
            include_srid: true,
        }
    }
}

/// Session configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionCfg {
    /// Maximum bytes kept from one engine message.
    pub message_limit: usize,
    pub codec: CodecCfg,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            message_limit: 255,
            codec: CodecCfg::default(),
        }
    }
}

#[derive(Default)]
struct CodecState {
    writer: Option<RawHandle>,
    reader: Option<RawHandle>,
}

pub(crate) struct Inner {
    engine: Rc<dyn Engine>,
    cfg: SessionCfg,
    pub(crate) pending: Rc<RefCell<Option<String>>>,
    notices: Rc<Cell<usize>>,
    codec: RefCell<CodecState>,
}

/// Shared handle to an open engine session.
#[derive(Clone)]
pub struct Session(pub(crate) Rc<Inner>);

/// Keep at most `limit` bytes, cut on a char boundary.
fn clip(message: &str, limit: usize) -> String {
    if message.len() <= limit {
        return message.to_string();
    }
    let mut end = limit;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

impl Session {
    /// Open a session over `engine` with default configuration.
    pub fn open<E: Engine + 'static>(engine: E) -> Result<Self> {
        Self::open_with(engine, SessionCfg::default())
    }

    pub fn open_with<E: Engine + 'static>(engine: E, cfg: SessionCfg) -> Result<Self> {
        Self::open_shared_with(Rc::new(engine), cfg)
    }

    /// Open over an engine the caller keeps a handle to (leak accounting,
    /// inspection of engine-side state).
    ///
    /// An engine serves one session at a time: while another session holds
    /// its callbacks this fails with `ProtocolViolation`.
    pub fn open_shared(engine: Rc<dyn Engine>) -> Result<Self> {
        Self::open_shared_with(engine, SessionCfg::default())
    }

    pub fn open_shared_with(engine: Rc<dyn Engine>, cfg: SessionCfg) -> Result<Self> {
        let pending: Rc<RefCell<Option<String>>> = Rc::default();
        let notices: Rc<Cell<usize>> = Rc::default();
        let limit = cfg.message_limit;
        let notice = {
            let notices = notices.clone();
            Box::new(move |message: &str| {
                notices.set(notices.get() + 1);
                warn!(target: "georelay::notice", "{}", clip(message, limit));
            })
        };
        let error = {
            let pending = pending.clone();
            Box::new(move |message: &str| {
                *pending.borrow_mut() = Some(clip(message, limit));
            })
        };
        if engine.set_handlers(notice, error) != STATUS_OK {
            return Err(RelayError::protocol("engine already serves another session"));
        }
        debug!(version = %engine.version(), "engine session opened");
        Ok(Session(Rc::new(Inner {
            engine,
            cfg,
            pending,
            notices,
            codec: RefCell::default(),
        })))
    }

    #[inline]
    pub(crate) fn engine(&self) -> &dyn Engine {
        &*self.0.engine
    }

    pub fn cfg(&self) -> &SessionCfg {
        &self.0.cfg
    }

    /// Engine notices forwarded so far.
    pub fn notices(&self) -> usize {
        self.0.notices.get()
    }

    pub fn version(&self) -> String {
        self.engine().version()
    }

    /// True if both handles refer to the same open session.
    #[inline]
    pub fn same(&self, other: &Session) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Fail with `ProtocolViolation` unless `other` is this session.
    pub(crate) fn ensure_same(&self, other: &Session) -> Result<()> {
        if self.same(other) {
            Ok(())
        } else {
            Err(RelayError::protocol(
                "handles from different engine sessions cannot be combined",
            ))
        }
    }

    /// Session serializer, created and configured on first use.
    pub(crate) fn codec_writer(&self) -> Result<RawHandle> {
        if let Some(w) = self.0.codec.borrow().writer {
            return Ok(w);
        }
        let engine = self.engine();
        let w = self.handle(engine.wkb_writer_create())?;
        let codec = self.cfg().codec;
        let configured = self
            .status(engine.wkb_writer_set_output_dimension(w, i32::from(codec.output_dimension)))
            .and_then(|()| self.status(engine.wkb_writer_set_include_srid(w, codec.include_srid)));
        if let Err(err) = configured {
            engine.wkb_writer_destroy(w);
            return Err(err);
        }
        self.0.codec.borrow_mut().writer = Some(w);
        Ok(w)
    }

    /// Session deserializer, created on first use.
    pub(crate) fn codec_reader(&self) -> Result<RawHandle> {
        if let Some(r) = self.0.codec.borrow().reader {
            return Ok(r);
        }
        let r = self.handle(self.engine().wkb_reader_create())?;
        self.0.codec.borrow_mut().reader = Some(r);
        Ok(r)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let codec = self.codec.get_mut();
        if let Some(w) = codec.writer.take() {
            self.engine.wkb_writer_destroy(w);
        }
        if let Some(r) = codec.reader.take() {
            self.engine.wkb_reader_destroy(r);
        }
        self.engine.clear_handlers();
        debug!(notices = self.notices.get(), "engine session closed");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cfg", &self.0.cfg)
            .field("notices", &self.0.notices.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemoryEngine;
    use crate::prelude::*;

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("abc", 8), "abc");
        assert_eq!(clip("abcdef", 3), "abc");
        // 'é' is two bytes; cutting inside it backs off.
        assert_eq!(clip("aé", 2), "a");
    }

    #[test]
    fn codec_state_is_created_once_and_destroyed_at_close() {
        let engine = Rc::new(MemoryEngine::new());
        let session = Session::open_shared(engine.clone()).unwrap();
        assert_eq!(engine.live_handles(), 0);

        let g = WktReader::new(&session).unwrap().read("POINT (1 2)").unwrap();
        let first = session.encode(&g).unwrap();
        let second = session.encode(&g).unwrap();
        assert_eq!(first, second);
        session.decode(&first).unwrap();
        // geometry + writer + reader
        assert_eq!(engine.live_handles(), 3);

        drop(g);
        drop(session);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn engine_outlives_the_session_handle_while_wrappers_live() {
        let engine = Rc::new(MemoryEngine::new());
        let session = Session::open_shared(engine.clone()).unwrap();
        let g = WktReader::new(&session).unwrap().read("POINT (1 2)").unwrap();
        drop(session);
        // The wrapper still holds the session; the geometry stays usable.
        assert_eq!(g.to_wkt().unwrap(), "POINT (1 2)");
        drop(g);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn engine_serves_one_session_at_a_time() {
        let engine = Rc::new(MemoryEngine::new());
        let first = Session::open_shared(engine.clone()).unwrap();
        assert!(matches!(
            Session::open_shared(engine.clone()),
            Err(RelayError::ProtocolViolation { .. })
        ));
        // The refused open left the first session's callbacks in place.
        let reader = WktReader::new(&first).unwrap();
        match reader.read("CIRCLE (1 2)").unwrap_err() {
            RelayError::MalformedInput { message } => assert!(message.contains("Unknown type")),
            other => panic!("unexpected {other:?}"),
        }
        drop(reader);
        drop(first);

        let second = Session::open_shared(engine.clone()).unwrap();
        let err = WktReader::new(&second).unwrap().read("CIRCLE (1 2)").unwrap_err();
        assert!(err.to_string().contains("Unknown type"));
    }

    #[test]
    fn notices_are_counted() {
        let engine = Rc::new(MemoryEngine::new());
        let session = Session::open_shared(engine.clone()).unwrap();
        let g = WktReader::new(&session)
            .unwrap()
            .read("MULTIPOINT ((0 0), (1 1))")
            .unwrap();
        let raw = g.raw().unwrap();
        let child = engine.geometry_n(raw, 0).unwrap();
        // Destroying a borrowed child is refused with a notice.
        engine.geom_destroy(child);
        assert_eq!(session.notices(), 1);
    }

    #[test]
    fn long_engine_messages_are_clipped() {
        let cfg = SessionCfg {
            message_limit: 16,
            ..SessionCfg::default()
        };
        let session = Session::open_with(MemoryEngine::new(), cfg).unwrap();
        let err = WktReader::new(&session)
            .unwrap()
            .read("CIRCLE (1 2)")
            .unwrap_err();
        match err {
            RelayError::MalformedInput { message } => assert_eq!(message.len(), 16),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn two_dimensional_codec_drops_z() {
        let cfg = SessionCfg {
            codec: CodecCfg {
                output_dimension: 2,
                include_srid: false,
            },
            ..SessionCfg::default()
        };
        let session = Session::open_with(MemoryEngine::new(), cfg).unwrap();
        let g = WktReader::new(&session).unwrap().read("POINT Z (1 2 3)").unwrap();
        let back = session.decode(&session.encode(&g).unwrap()).unwrap();
        assert_eq!(back.to_wkt().unwrap(), "POINT (1 2)");
    }
}
