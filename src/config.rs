//! Runtime configuration for the tensor core.

/// Tunable knobs for kernel execution and pattern handling.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Advisory: intended to let a caller skip redundant shape/dtype
    /// checks once upstream code has already validated a pattern or
    /// operand pair. Not currently read by any kernel or einops entry
    /// point — every validation path runs unconditionally regardless of
    /// this flag. Kept as a forward-looking knob mirroring the teacher's
    /// own `EinsumConfig`, which carries the same kind of aspirational
    /// setting.
    pub validate_shapes: bool,
    /// Use `rayon` to parallelize kernels over large buffers. Below
    /// `parallel_threshold` elements, a single-threaded loop is used
    /// regardless, since the cost of spinning up the thread pool exceeds
    /// the work for small tensors.
    pub use_parallelism: bool,
    pub parallel_threshold: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            validate_shapes: true,
            use_parallelism: true,
            parallel_threshold: 1 << 16,
        }
    }
}

impl CoreConfig {
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_shapes = validate;
        self
    }

    pub fn with_parallelism(mut self, enabled: bool) -> Self {
        self.use_parallelism = enabled;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// No parallelism — useful for debugging a suspected kernel bug in
    /// isolation, or for a bit-for-bit reference trace.
    pub fn safe() -> Self {
        CoreConfig {
            validate_shapes: true,
            use_parallelism: false,
            parallel_threshold: usize::MAX,
        }
    }

    /// Always parallelizes, regardless of buffer size.
    pub fn fast() -> Self {
        CoreConfig {
            validate_shapes: false,
            use_parallelism: true,
            parallel_threshold: 0,
        }
    }
}
