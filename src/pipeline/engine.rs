use crate::error::Result;
use crate::pipeline::postprocess::RawTensor;

/// A loaded model that maps a normalized NHWC RGB input to the raw
/// `[attributes x anchors]` detection tensor.
pub trait InferenceEngine {
    /// Side of the square input the model expects.
    fn input_size(&self) -> u32;

    fn run(&mut self, input: &[f32]) -> Result<RawTensor>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn input_size(&self) -> u32 {
        (**self).input_size()
    }

    fn run(&mut self, input: &[f32]) -> Result<RawTensor> {
        (**self).run(input)
    }
}
