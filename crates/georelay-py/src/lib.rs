//! PyO3 bindings for `georelay`.
//!
//! Notes
//! - Each Python thread gets its own engine session (`common::session`);
//!   wrapper classes are `unsendable` because sessions are `!Send`.
//! - Python objects own their relay: dropping the object releases the
//!   engine handle exactly once.

use pyo3::prelude::*;

mod codec;
mod common;
mod geometry;

#[pymodule]
fn georelay_native(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add("__version__", georelay::VERSION)?;
    geometry::register(m)?;
    codec::register(m)?;
    Ok(())
}
