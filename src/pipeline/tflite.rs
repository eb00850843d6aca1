use ::tflite::ops::builtin::BuiltinOpResolver;
use ::tflite::{FlatBufferModel, Interpreter, InterpreterBuilder};

use crate::app::config::ModelConfig;
use crate::error::{DetectorError, Result};
use crate::pipeline::engine::InferenceEngine;
use crate::pipeline::postprocess::{RawTensor, BOX_ROWS};

pub struct TFLiteEngine {
    interpreter: Interpreter<'static, BuiltinOpResolver>,
    input_size: u32,
}

impl TFLiteEngine {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let path = config.model_filename.to_string_lossy().into_owned();
        let model = FlatBufferModel::build_from_file(&path)?;
        let resolver = BuiltinOpResolver::default();
        let builder = InterpreterBuilder::new(model, resolver)?;
        let mut interpreter = builder.build()?;
        interpreter.set_num_threads(config.num_threads as i32);
        interpreter.allocate_tensors()?;

        if interpreter.inputs().len() != 1 || interpreter.outputs().is_empty() {
            return Err(DetectorError::InvalidInput(format!(
                "expected one input and at least one output, model has {} and {}",
                interpreter.inputs().len(),
                interpreter.outputs().len()
            )));
        }

        // NHWC: [1, height, width, 3]
        let tinfos = interpreter.get_input_details()?;
        let dims = &tinfos[0].dims;
        if dims.len() != 4 || dims[1] != dims[2] || dims[1] as u32 != config.input_size {
            return Err(DetectorError::InvalidInput(format!(
                "model input {:?} does not match {}x{}",
                dims, config.input_size, config.input_size
            )));
        }

        let out_dims = output_dims(&interpreter);
        output_shape(&out_dims)?;
        tracing::info!(input = ?dims, output = ?out_dims, "loaded tflite model");
        Ok(Self {
            interpreter,
            input_size: config.input_size,
        })
    }
}

impl InferenceEngine for TFLiteEngine {
    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn run(&mut self, input: &[f32]) -> Result<RawTensor> {
        let input_index = self.interpreter.inputs()[0];
        let tensor = self.interpreter.tensor_data_mut::<f32>(input_index)?;
        if tensor.len() != input.len() {
            return Err(DetectorError::InvalidInput(format!(
                "input has {} values, model expects {}",
                input.len(),
                tensor.len()
            )));
        }
        tensor.copy_from_slice(input);
        self.interpreter.invoke()?;

        let output_index = self.interpreter.outputs()[0];
        let (attributes, anchors) = output_shape(&output_dims(&self.interpreter))?;
        let output: &[f32] = self.interpreter.tensor_data(output_index)?;
        RawTensor::new(output.to_vec(), attributes, anchors)
    }
}

fn output_dims(interpreter: &Interpreter<'static, BuiltinOpResolver>) -> Vec<usize> {
    interpreter
        .tensor_info(interpreter.outputs()[0])
        .map(|info| info.dims)
        .unwrap_or_default()
}

/// `[1, attributes, anchors]` with at least one class row.
fn output_shape(dims: &[usize]) -> Result<(usize, usize)> {
    match dims {
        [1, attributes, anchors] if *attributes > BOX_ROWS => Ok((*attributes, *anchors)),
        other => Err(DetectorError::InvalidInput(format!(
            "unexpected output shape {:?}",
            other
        ))),
    }
}
