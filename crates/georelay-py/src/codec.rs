use georelay::{ByteOrder, WkbReader, WkbWriter, WktReader};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyBytes;

use crate::common::{map_relay_err, session};
use crate::geometry::PyGeometry;

#[pyclass(name = "WKBWriter", module = "georelay_native", unsendable)]
pub struct PyWkbWriter {
    inner: WkbWriter,
}

#[pymethods]
impl PyWkbWriter {
    #[new]
    fn new() -> PyResult<Self> {
        let inner = WkbWriter::new(&session()?).map_err(map_relay_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn output_dimension(&self) -> PyResult<usize> {
        self.inner.output_dimension().map_err(map_relay_err)
    }

    #[setter]
    fn set_output_dimension(&mut self, dimension: u8) -> PyResult<()> {
        self.inner
            .set_output_dimension(dimension)
            .map_err(map_relay_err)
    }

    /// 0 = big endian (XDR), 1 = little endian (NDR).
    #[getter]
    fn byte_order(&self) -> PyResult<i32> {
        self.inner.byte_order().map(ByteOrder::code).map_err(map_relay_err)
    }

    #[setter]
    fn set_byte_order(&mut self, code: i32) -> PyResult<()> {
        let order = match code {
            0 => ByteOrder::Big,
            1 => ByteOrder::Little,
            other => {
                return Err(PyValueError::new_err(format!(
                    "byte order must be 0 or 1, got {other}"
                )))
            }
        };
        self.inner.set_byte_order(order).map_err(map_relay_err)
    }

    #[getter]
    fn include_srid(&self) -> PyResult<bool> {
        self.inner.include_srid().map_err(map_relay_err)
    }

    #[setter]
    fn set_include_srid(&mut self, include: bool) -> PyResult<()> {
        self.inner.set_include_srid(include).map_err(map_relay_err)
    }

    fn write<'py>(&self, py: Python<'py>, g: &PyGeometry) -> PyResult<&'py PyBytes> {
        let bytes = self.inner.write(&g.inner).map_err(map_relay_err)?;
        Ok(PyBytes::new(py, &bytes))
    }

    fn write_hex(&self, g: &PyGeometry) -> PyResult<String> {
        self.inner.write_hex(&g.inner).map_err(map_relay_err)
    }
}

#[pyclass(name = "WKBReader", module = "georelay_native", unsendable)]
pub struct PyWkbReader {
    inner: WkbReader,
}

#[pymethods]
impl PyWkbReader {
    #[new]
    fn new() -> PyResult<Self> {
        let inner = WkbReader::new(&session()?).map_err(map_relay_err)?;
        Ok(Self { inner })
    }

    fn read(&self, data: &[u8]) -> PyResult<PyGeometry> {
        self.inner.read(data).map(PyGeometry::from).map_err(map_relay_err)
    }

    fn read_hex(&self, text: &str) -> PyResult<PyGeometry> {
        self.inner.read_hex(text).map(PyGeometry::from).map_err(map_relay_err)
    }
}

#[pyclass(name = "WKTReader", module = "georelay_native", unsendable)]
pub struct PyWktReader {
    inner: WktReader,
}

#[pymethods]
impl PyWktReader {
    #[new]
    fn new() -> PyResult<Self> {
        let inner = WktReader::new(&session()?).map_err(map_relay_err)?;
        Ok(Self { inner })
    }

    fn read(&self, text: &str) -> PyResult<PyGeometry> {
        self.inner.read(text).map(PyGeometry::from).map_err(map_relay_err)
    }
}

pub fn register(m: &PyModule) -> PyResult<()> {
    m.add_class::<PyWkbWriter>()?;
    m.add_class::<PyWkbReader>()?;
    m.add_class::<PyWktReader>()?;
    Ok(())
}
