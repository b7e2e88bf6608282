use georelay::{MemoryEngine, RelayError, Session, StyleValue};
use pyo3::exceptions::{PyIndexError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

thread_local! {
    static SESSION: georelay::Result<Session> = Session::open(MemoryEngine::new());
}

/// The calling thread's engine session.
pub fn session() -> PyResult<Session> {
    SESSION.with(|s| s.clone().map_err(map_relay_err))
}

pub fn map_relay_err(err: RelayError) -> PyErr {
    let msg = err.to_string();
    match err {
        RelayError::MalformedInput { .. } | RelayError::EngineFailure { .. } => {
            PyValueError::new_err(msg)
        }
        RelayError::IndexOutOfRange { .. } => PyIndexError::new_err(msg),
        RelayError::TypeMismatch { .. } => PyTypeError::new_err(msg),
        RelayError::UnboundHandle { .. } | RelayError::ProtocolViolation { .. } => {
            PyRuntimeError::new_err(msg)
        }
    }
}

fn style_value(value: &PyAny) -> PyResult<StyleValue> {
    // bool before int: Python bools are ints.
    if let Ok(b) = value.extract::<bool>() {
        return Ok(StyleValue::Bool(b));
    }
    if let Ok(i) = value.extract::<i64>() {
        return Ok(StyleValue::Int(i));
    }
    if let Ok(f) = value.extract::<f64>() {
        return Ok(StyleValue::Float(f));
    }
    if let Ok(s) = value.extract::<String>() {
        return Ok(StyleValue::Text(s));
    }
    Err(PyTypeError::new_err(format!(
        "unsupported buffer option value: {}",
        value.get_type().name()?
    )))
}

/// Keyword arguments as `(name, value)` buffer options.
pub fn style_options(kwargs: Option<&PyDict>) -> PyResult<Vec<(String, StyleValue)>> {
    let Some(kwargs) = kwargs else {
        return Ok(Vec::new());
    };
    kwargs
        .iter()
        .map(|(k, v)| Ok((k.extract::<String>()?, style_value(v)?)))
        .collect()
}
