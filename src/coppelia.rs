//! [`Simulator`] over the simulator's Python ZMQ remote API client, driven
//! through an embedded interpreter.

use pyo3::{prelude::*, types::PyDict};

use crate::config::SimulatorConfig;
use crate::environment::{Handle, Simulator};
use crate::error::{MixError, Result};

pub struct CoppeliaSession {
    client: PyObject,
    sim: PyObject,
}

impl CoppeliaSession {
    /// Opens a stepped session against a running simulator.
    pub fn connect(config: &SimulatorConfig) -> Result<Self> {
        let session = Python::with_gil(|py| -> PyResult<Self> {
            let sys = py.import_bound("sys")?;
            sys.getattr("path")?
                .call_method1("append", (config.api_path.to_string_lossy().into_owned(),))?;

            let remote_api = py.import_bound("zmqRemoteApi")?;
            let kwargs = PyDict::new_bound(py);
            kwargs.set_item("port", config.port)?;
            let client = remote_api
                .getattr("RemoteAPIClient")?
                .call((config.host.as_str(),), Some(&kwargs))?;
            client.call_method1("setStepping", (true,))?;
            let sim = client.call_method1("getObject", ("sim",))?;

            // The idle loop runs at 8 Hz by default, which makes message
            // handling slow while the simulation is stopped.
            let idle_fps = sim.getattr("intparam_idle_fps")?;
            sim.call_method1("setInt32Param", (idle_fps, 0))?;

            Ok(Self {
                client: client.unbind(),
                sim: sim.unbind(),
            })
        })?;
        Ok(session)
    }

    fn call<T>(&self, method: &str, args: impl IntoPy<Py<pyo3::types::PyTuple>>) -> Result<T>
    where
        T: for<'py> FromPyObject<'py>,
    {
        let value = Python::with_gil(|py| -> PyResult<T> {
            self.sim.bind(py).call_method1(method, args)?.extract()
        })?;
        Ok(value)
    }

    fn world(&self, py: Python<'_>) -> PyResult<PyObject> {
        Ok(self.sim.bind(py).getattr("handle_world")?.unbind())
    }
}

impl Simulator for CoppeliaSession {
    fn object_handle(&mut self, name: &str) -> Result<Handle> {
        // Scene paths go through the current lookup, bare names through the
        // legacy one that the spawned objects are registered with.
        if name.starts_with('/') {
            self.call("getObject", (name,))
        } else {
            self.call("getObjectHandle", (name,))
        }
    }

    fn child_script(&mut self, object: Handle) -> Result<Handle> {
        let handle = Python::with_gil(|py| -> PyResult<Handle> {
            let sim = self.sim.bind(py);
            let kind = sim.getattr("scripttype_childscript")?;
            sim.call_method1("getScript", (kind, object))?.extract()
        })?;
        Ok(handle)
    }

    fn start_simulation(&mut self) -> Result<()> {
        Python::with_gil(|py| self.sim.bind(py).call_method0("startSimulation").map(drop))?;
        Ok(())
    }

    fn stop_simulation(&mut self) -> Result<()> {
        Python::with_gil(|py| self.sim.bind(py).call_method0("stopSimulation").map(drop))?;
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        Python::with_gil(|py| self.client.bind(py).call_method0("step").map(drop))?;
        Ok(())
    }

    fn object_position(&mut self, object: Handle) -> Result<[f64; 3]> {
        let position = Python::with_gil(|py| -> PyResult<Vec<f64>> {
            let world = self.world(py)?;
            self.sim
                .bind(py)
                .call_method1("getObjectPosition", (object, world))?
                .extract()
        })?;
        match position[..] {
            [x, y, z] => Ok([x, y, z]),
            _ => Err(MixError::Simulator(format!(
                "getObjectPosition returned {} coordinates",
                position.len()
            ))),
        }
    }

    fn set_object_position(&mut self, object: Handle, position: [f64; 3]) -> Result<()> {
        Python::with_gil(|py| -> PyResult<()> {
            let world = self.world(py)?;
            self.sim
                .bind(py)
                .call_method1("setObjectPosition", (object, world, position.to_vec()))?;
            Ok(())
        })?;
        Ok(())
    }

    fn call_script_function(
        &mut self,
        function: &str,
        script: Handle,
        ints: &[i64],
        floats: &[f64],
        strings: &[&str],
    ) -> Result<()> {
        Python::with_gil(|py| -> PyResult<()> {
            self.sim.bind(py).call_method1(
                "callScriptFunction",
                (function, script, ints.to_vec(), floats.to_vec(), strings.to_vec()),
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn float_signal(&mut self, name: &str) -> Result<Option<f64>> {
        self.call("getFloatSignal", (name,))
    }

    fn set_float_signal(&mut self, name: &str, value: f64) -> Result<()> {
        Python::with_gil(|py| -> PyResult<()> {
            self.sim
                .bind(py)
                .call_method1("setFloatSignal", (name, value))?;
            Ok(())
        })?;
        Ok(())
    }
}
