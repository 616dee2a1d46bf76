//! Flush aggregation.
//!
//! A connection has up to two things to flush: its own write buffer, and the
//! stream underneath when the stream buffers too (TLS). [`FlushChain`] fixes
//! the order once, when the stream is bound, so that flushing never has to
//! re-inspect the stream.

/// One flushable layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStage {
    /// Drain the connection's write buffer into the stream.
    Buffer,
    /// Flush the stream itself.
    Stream,
}

/// Ordered flush stages.
///
/// The writer runs the stages in order and stops at the first error; later
/// stages are never attempted after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushChain {
    stages: &'static [FlushStage],
}

impl FlushChain {
    const BUFFER: &'static [FlushStage] = &[FlushStage::Buffer];
    const BUFFER_THEN_STREAM: &'static [FlushStage] = &[FlushStage::Buffer, FlushStage::Stream];

    /// Resolves the chain for a stream.
    #[must_use]
    pub const fn for_stream(stream_needs_flush: bool) -> Self {
        let stages = if stream_needs_flush {
            Self::BUFFER_THEN_STREAM
        } else {
            Self::BUFFER
        };
        Self { stages }
    }

    /// Returns the stages in execution order.
    #[must_use]
    pub const fn stages(self) -> &'static [FlushStage] {
        self.stages
    }
}
