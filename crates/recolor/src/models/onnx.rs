//! Colorization models served by ONNX Runtime.

use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use recolor_pipeline::{
    ChrominancePrediction, Colorizer, Dimensions, InferenceError, LuminanceFrame,
};

use super::StartupError;
use crate::config::ModelSpec;

/// An ONNX colorization model.
///
/// Input: L* as a `(1, 1, H, W)` `f32` tensor. Output: a*/b* as a
/// `(1, 2, H, W)` `f32` tensor, with `H = W = INFERENCE_SIZE`.
pub struct OnnxColorizer {
    name: String,
    // `Session::run` takes `&mut self`.
    session: Mutex<Session>,
}

impl OnnxColorizer {
    /// Build a session from the model file named by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::ModelLoad`] if ONNX Runtime rejects the file.
    pub fn load(spec: &ModelSpec) -> Result<Self, StartupError> {
        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(&spec.path))
            .map_err(|source| StartupError::ModelLoad {
                name: spec.name.clone(),
                path: spec.path.clone(),
                message: source.to_string(),
            })?;
        Ok(Self {
            name: spec.name.clone(),
            session: Mutex::new(session),
        })
    }
}

fn runtime_error(source: ort::Error) -> InferenceError {
    InferenceError::new(source.to_string())
}

impl Colorizer for OnnxColorizer {
    fn predict(&self, frame: &LuminanceFrame) -> Result<ChrominancePrediction, InferenceError> {
        let Dimensions { width, height } = frame.dimensions();
        let (w, h) = (width as usize, height as usize);

        let input = Array4::from_shape_vec((1, 1, h, w), frame.as_slice().to_vec())
            .map_err(|e| InferenceError::new(format!("bad input shape: {e}")))?;
        let input = Tensor::from_array(input).map_err(runtime_error)?;

        tracing::debug!(model = %self.name, width, height, "running inference");
        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::new(format!("{}: session lock poisoned", self.name)))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(runtime_error)?;
        let output = outputs
            .values()
            .next()
            .ok_or_else(|| InferenceError::new("model produced no output"))?;

        let (shape, data) = output.try_extract_tensor::<f32>().map_err(runtime_error)?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        #[allow(clippy::cast_possible_wrap)]
        let expected = [1, 2, h as i64, w as i64];
        if dims != expected {
            return Err(InferenceError::new(format!(
                "output shape {dims:?}, expected {expected:?}"
            )));
        }

        let plane = w * h;
        let (a, b) = data.split_at(plane);
        ChrominancePrediction::from_raw(width, height, a.to_vec(), b[..plane].to_vec())
            .ok_or_else(|| InferenceError::new("output does not match frame size"))
    }
}
