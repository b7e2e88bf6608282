//! `Geometry` class: one Python object per owned engine geometry.

use georelay::{BufferStyle, Geometry, Wrapper};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};

use crate::common::{map_relay_err, session, style_options};

#[pyclass(name = "Geometry", module = "georelay_native", unsendable)]
pub struct PyGeometry {
    pub inner: Geometry,
}

impl From<Geometry> for PyGeometry {
    fn from(inner: Geometry) -> Self {
        Self { inner }
    }
}

fn wrap_all(parts: Vec<Geometry>) -> Vec<PyGeometry> {
    parts.into_iter().map(PyGeometry::from).collect()
}

#[pymethods]
impl PyGeometry {
    /// Parse WKT into a new geometry.
    #[staticmethod]
    fn from_wkt(text: &str) -> PyResult<Self> {
        let s = session()?;
        let reader = georelay::WktReader::new(&s).map_err(map_relay_err)?;
        reader.read(text).map(Self::from).map_err(map_relay_err)
    }

    /// Decode the hex form produced by `__reduce__`.
    #[staticmethod]
    fn from_hex(text: &str) -> PyResult<Self> {
        session()?
            .unserialize(georelay::ResourceKind::Geometry, text)
            .map(Self::from)
            .map_err(map_relay_err)
    }

    #[getter]
    fn wkt(&self) -> PyResult<String> {
        self.inner.to_wkt().map_err(map_relay_err)
    }

    #[getter]
    fn wkb<'py>(&self, py: Python<'py>) -> PyResult<&'py PyBytes> {
        let bytes = self
            .inner
            .session()
            .encode(&self.inner)
            .map_err(map_relay_err)?;
        Ok(PyBytes::new(py, &bytes))
    }

    #[getter]
    fn geom_type(&self) -> PyResult<String> {
        self.inner.type_name().map_err(map_relay_err)
    }

    #[getter]
    fn type_id(&self) -> PyResult<usize> {
        self.inner.type_id().map_err(map_relay_err)
    }

    #[getter]
    fn srid(&self) -> PyResult<i32> {
        self.inner.srid().map_err(map_relay_err)
    }

    #[setter]
    fn set_srid(&mut self, srid: i32) -> PyResult<()> {
        self.inner.set_srid(srid).map_err(map_relay_err)
    }

    #[getter]
    fn is_empty(&self) -> PyResult<bool> {
        self.inner.is_empty().map_err(map_relay_err)
    }

    #[getter]
    fn has_z(&self) -> PyResult<bool> {
        self.inner.has_z().map_err(map_relay_err)
    }

    #[getter]
    fn is_closed(&self) -> PyResult<bool> {
        self.inner.is_closed().map_err(map_relay_err)
    }

    #[getter]
    fn is_ring(&self) -> PyResult<bool> {
        self.inner.is_ring().map_err(map_relay_err)
    }

    #[getter]
    fn area(&self) -> PyResult<f64> {
        self.inner.area().map_err(map_relay_err)
    }

    #[getter]
    fn length(&self) -> PyResult<f64> {
        self.inner.length().map_err(map_relay_err)
    }

    #[getter]
    fn x(&self) -> PyResult<f64> {
        self.inner.x().map_err(map_relay_err)
    }

    #[getter]
    fn y(&self) -> PyResult<f64> {
        self.inner.y().map_err(map_relay_err)
    }

    #[getter]
    fn num_points(&self) -> PyResult<usize> {
        self.inner.num_points().map_err(map_relay_err)
    }

    #[getter]
    fn num_coordinates(&self) -> PyResult<usize> {
        self.inner.num_coordinates().map_err(map_relay_err)
    }

    #[getter]
    fn dimension(&self) -> PyResult<usize> {
        self.inner.dimension().map_err(map_relay_err)
    }

    #[getter]
    fn envelope(&self) -> PyResult<Self> {
        self.inner.envelope().map(Self::from).map_err(map_relay_err)
    }

    /// Direct children as owned geometries.
    #[getter]
    fn geoms(&self) -> PyResult<Vec<Self>> {
        self.inner.components().map(wrap_all).map_err(map_relay_err)
    }

    fn geometry_n(&self, n: usize) -> PyResult<Self> {
        self.inner.geometry_n(n).map(Self::from).map_err(map_relay_err)
    }

    #[getter]
    fn exterior(&self) -> PyResult<Self> {
        self.inner.exterior_ring().map(Self::from).map_err(map_relay_err)
    }

    #[getter]
    fn interiors(&self) -> PyResult<Vec<Self>> {
        let n = self.inner.num_interior_rings().map_err(map_relay_err)?;
        (0..n)
            .map(|i| self.inner.interior_ring_n(i).map(Self::from).map_err(map_relay_err))
            .collect()
    }

    fn point_n(&self, n: usize) -> PyResult<Self> {
        self.inner.point_n(n).map(Self::from).map_err(map_relay_err)
    }

    #[getter]
    fn start_point(&self) -> PyResult<Self> {
        self.inner.start_point().map(Self::from).map_err(map_relay_err)
    }

    #[getter]
    fn end_point(&self) -> PyResult<Self> {
        self.inner.end_point().map(Self::from).map_err(map_relay_err)
    }

    #[pyo3(signature = (other, tolerance = 0.0))]
    fn equals_exact(&self, other: &PyGeometry, tolerance: f64) -> PyResult<bool> {
        self.inner
            .equals_exact(&other.inner, tolerance)
            .map_err(map_relay_err)
    }

    /// Buffer with `quad_segs`, `endcap`, `join`, `mitre_limit` and
    /// `single_sided` keywords.
    #[pyo3(signature = (width, **kwargs))]
    fn buffer(&self, width: f64, kwargs: Option<&PyDict>) -> PyResult<Self> {
        let style = BufferStyle::from_options(style_options(kwargs)?).map_err(map_relay_err)?;
        self.inner.buffer(width, &style).map(Self::from).map_err(map_relay_err)
    }

    #[pyo3(name = "clone")]
    fn deep_clone(&self) -> PyResult<Self> {
        self.inner.deep_clone().map(Self::from).map_err(map_relay_err)
    }

    fn __str__(&self) -> PyResult<String> {
        self.wkt()
    }

    fn __repr__(&self) -> PyResult<String> {
        Ok(format!("<Geometry {}>", self.wkt()?))
    }

    /// Pickle through the session's hex form.
    fn __reduce__(slf: &PyCell<Self>) -> PyResult<(PyObject, (String,))> {
        let py = slf.py();
        let this = slf.borrow();
        let hex = this
            .inner
            .session()
            .encode_hex(&this.inner)
            .map_err(map_relay_err)?;
        let ctor = slf.get_type().getattr("from_hex")?.into_py(py);
        Ok((ctor, (hex,)))
    }
}

#[pyfunction]
fn polygonize(
    g: &PyGeometry,
) -> PyResult<(Vec<PyGeometry>, Vec<PyGeometry>, Vec<PyGeometry>, Vec<PyGeometry>)> {
    let out = georelay::ops::polygonize(&g.inner).map_err(map_relay_err)?;
    Ok((
        wrap_all(out.rings),
        wrap_all(out.cut_edges),
        wrap_all(out.dangles),
        wrap_all(out.invalid_rings),
    ))
}

#[pyfunction]
fn line_merge(g: &PyGeometry) -> PyResult<Vec<PyGeometry>> {
    georelay::ops::line_merge(&g.inner)
        .map(wrap_all)
        .map_err(map_relay_err)
}

#[pyfunction]
fn shared_paths(a: &PyGeometry, b: &PyGeometry) -> PyResult<PyGeometry> {
    georelay::ops::shared_paths(&a.inner, &b.inner)
        .map(PyGeometry::from)
        .map_err(map_relay_err)
}

#[pyfunction]
fn relate_match(matrix: &str, pattern: &str) -> PyResult<bool> {
    georelay::ops::relate_match(&session()?, matrix, pattern).map_err(map_relay_err)
}

#[pyfunction]
fn engine_version() -> PyResult<String> {
    Ok(georelay::ops::engine_version(&session()?))
}

pub fn register(m: &PyModule) -> PyResult<()> {
    m.add_class::<PyGeometry>()?;
    m.add_function(wrap_pyfunction!(polygonize, m)?)?;
    m.add_function(wrap_pyfunction!(line_merge, m)?)?;
    m.add_function(wrap_pyfunction!(shared_paths, m)?)?;
    m.add_function(wrap_pyfunction!(relate_match, m)?)?;
    m.add_function(wrap_pyfunction!(engine_version, m)?)?;
    Ok(())
}
