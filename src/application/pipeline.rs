//! Recording pipeline use case

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::config::{DEFAULT_BUFFER_COUNT, DEFAULT_CHANNELS, DEFAULT_OUTPUT_PATH};
use crate::domain::recording::{Codec, ContainerFormat, Duration, StreamFormat};
use crate::domain::session::{RecordingSession, SessionState};

use super::buffer_pool::{BufferLayout, BufferPool};
use super::error::RecorderError;
use super::ports::{CaptureBackend, CaptureSession, FormatNegotiator, OutputSink, SinkFactory};
use super::recording_state::RecordingState;

/// What one recording session produces
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub output_path: PathBuf,
    pub container: ContainerFormat,
    pub codec: Codec,
    pub channels: u16,
    /// Buffers kept in circulation
    pub buffer_count: usize,
    /// Audio held by each buffer
    pub buffer_duration: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            container: ContainerFormat::default(),
            codec: Codec::default(),
            channels: DEFAULT_CHANNELS,
            buffer_count: DEFAULT_BUFFER_COUNT,
            buffer_duration: Duration::default_buffer_duration(),
        }
    }
}

/// Why capture ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The user asked to stop
    Requested,
    /// Interrupted by a signal
    Interrupted,
    /// The time limit was reached
    TimeLimit,
    /// A completion failed
    Fault,
}

/// Result of a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub format: StreamFormat,
    pub packets_written: u64,
    pub bytes_written: u64,
    pub buffers_drained: u64,
    pub elapsed: std::time::Duration,
    pub cause: StopCause,
}

/// Everything alive between setup and teardown
struct ActiveSession<C, S: OutputSink> {
    capture: C,
    state: Arc<RecordingState<S>>,
    pool: BufferPool,
    format: StreamFormat,
    started_at: Instant,
}

/// Records from a capture backend into an output sink.
///
/// One pipeline runs one session: `start`, `wait_for_stop`, `stop`. Once
/// closed it cannot be restarted.
pub struct RecordingPipeline<N, B, F>
where
    N: FormatNegotiator,
    B: CaptureBackend,
    F: SinkFactory,
{
    negotiator: N,
    backend: B,
    sinks: F,
    session: RecordingSession,
    active: Option<ActiveSession<B::Session, F::Sink>>,
    cause: Option<StopCause>,
}

impl<N, B, F> RecordingPipeline<N, B, F>
where
    N: FormatNegotiator,
    B: CaptureBackend,
    F: SinkFactory,
{
    pub fn new(negotiator: N, backend: B, sinks: F) -> Self {
        Self {
            negotiator,
            backend,
            sinks,
            session: RecordingSession::new(),
            active: None,
            cause: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Packets appended to the output so far
    pub fn packets_written(&self) -> u64 {
        self.active
            .as_ref()
            .map_or(0, |active| active.state.next_packet_index())
    }

    /// Time since capture started
    pub fn elapsed(&self) -> std::time::Duration {
        self.active
            .as_ref()
            .map_or(std::time::Duration::ZERO, |active| active.started_at.elapsed())
    }

    /// Configure the session and start capturing.
    ///
    /// Returns once capture is running, without waiting for audio. On failure
    /// everything created so far is released and the pipeline is closed.
    ///
    /// # Returns
    /// The stream format being recorded
    pub fn start(&mut self, options: &SessionOptions) -> Result<StreamFormat, RecorderError> {
        self.session.begin_configuring()?;

        let mut active = match self.configure(options) {
            Ok(active) => active,
            Err(error) => {
                self.session.abort()?;
                return Err(error);
            }
        };

        active.state.set_running(true);
        if let Err(error) = active.capture.start() {
            active.state.set_running(false);
            release(&mut active.capture, &*active.state);
            self.session.abort()?;
            return Err(RecorderError::setup("start capture")(error));
        }

        let format = active.format;
        active.started_at = Instant::now();
        self.active = Some(active);
        self.session.begin_capturing()?;

        log::info!("recording {} to {}", format, options.output_path.display());
        Ok(format)
    }

    /// Wait until `trigger` resolves or a completion faults
    pub async fn wait_for_stop<T>(&self, trigger: T) -> StopCause
    where
        T: Future<Output = StopCause>,
    {
        let Some(active) = self.active.as_ref() else {
            return StopCause::Fault;
        };
        tokio::select! {
            cause = trigger => cause,
            error = active.state.faulted() => {
                log::debug!("stopping after fault: {}", error);
                StopCause::Fault
            }
        }
    }

    /// Stop capturing and finalize the output.
    ///
    /// Every release step runs even when an earlier one fails. A fault
    /// recorded during capture takes precedence over stop errors.
    pub fn stop(&mut self) -> Result<SessionSummary, RecorderError> {
        self.session.begin_stopping()?;
        let result = match self.active.take() {
            Some(active) => teardown(active, self.cause.unwrap_or(StopCause::Requested)),
            None => Err(RecorderError::Stop {
                operation: "stop capture",
                message: "no active capture session".to_string(),
            }),
        };
        self.session.close()?;
        result
    }

    /// Start, wait for `trigger` or a fault, then stop
    pub async fn run<T>(
        &mut self,
        options: &SessionOptions,
        trigger: T,
    ) -> Result<SessionSummary, RecorderError>
    where
        T: Future<Output = StopCause>,
    {
        self.start(options)?;
        let cause = self.wait_for_stop(trigger).await;
        self.record_cause(cause);
        self.stop()
    }

    /// Remember why capture is about to stop, for the summary
    pub fn record_cause(&mut self, cause: StopCause) {
        self.cause = Some(cause);
    }

    fn configure(
        &self,
        options: &SessionOptions,
    ) -> Result<ActiveSession<B::Session, F::Sink>, RecorderError> {
        options
            .container
            .check_codec(options.codec)
            .map_err(RecorderError::setup("check container"))?;

        let sample_rate = self
            .negotiator
            .default_input_sample_rate()
            .map_err(RecorderError::setup("read input sample rate"))?;
        let partial = StreamFormat::partial(options.codec, options.channels, sample_rate);
        let format = self
            .negotiator
            .complete_stream_description(partial)
            .map_err(RecorderError::setup("complete stream description"))?;

        let state: Arc<RecordingState<F::Sink>> = Arc::new(RecordingState::new());
        let mut capture = self
            .backend
            .create(&format, state.clone())
            .map_err(RecorderError::setup("create capture session"))?;

        match self.prepare(&capture, &state, options) {
            Ok((pool, format)) => Ok(ActiveSession {
                capture,
                state,
                pool,
                format,
                started_at: Instant::now(),
            }),
            Err(error) => {
                release(&mut capture, &*state);
                Err(error)
            }
        }
    }

    /// Output file, pre-roll side info and buffers for a created session
    fn prepare(
        &self,
        capture: &B::Session,
        state: &RecordingState<F::Sink>,
        options: &SessionOptions,
    ) -> Result<(BufferPool, StreamFormat), RecorderError> {
        // The session may have filled in fields the encoder decides
        let format = capture
            .stream_format()
            .map_err(RecorderError::setup("read stream format"))?;

        let sink = self
            .sinks
            .create(&options.output_path, options.container, &format, true)
            .map_err(RecorderError::setup("create output file"))?;
        state.attach_sink(sink);

        if let Some(info) = capture
            .codec_side_info()
            .map_err(RecorderError::setup("read codec side info"))?
        {
            state
                .apply_side_info(&info)
                .map_err(RecorderError::setup("apply codec side info"))?;
        }

        let max_packet_size = capture
            .max_packet_size()
            .map_err(RecorderError::setup("read max packet size"))?;
        let layout = BufferLayout::for_duration(
            &format,
            max_packet_size,
            options.buffer_duration.as_secs_f64(),
        );
        let (pool, slots) = BufferPool::allocate(options.buffer_count, layout)?;
        pool.submit_all(slots, capture)?;

        Ok((pool, format))
    }
}

impl<N, B, F> Drop for RecordingPipeline<N, B, F>
where
    N: FormatNegotiator,
    B: CaptureBackend,
    F: SinkFactory,
{
    fn drop(&mut self) {
        if !self.session.is_capturing() {
            return;
        }
        log::warn!("recording pipeline dropped while capturing, finalizing output");
        if let Err(error) = self.stop() {
            log::error!("finalizing on drop failed: {}", error);
        }
    }
}

/// Release a session that never started. Errors are only logged.
fn release<C: CaptureSession, S: OutputSink>(capture: &mut C, state: &RecordingState<S>) {
    if let Err(error) = capture.dispose() {
        log::warn!("dispose capture session failed: {}", error);
    }
    if let Err(error) = state.close_sink() {
        log::warn!("close output file failed: {}", error);
    }
}

/// Ordered stop: capture, post-roll side info, dispose, close
fn teardown<C: CaptureSession, S: OutputSink>(
    mut active: ActiveSession<C, S>,
    cause: StopCause,
) -> Result<SessionSummary, RecorderError> {
    let state = &active.state;
    let mut errors = Vec::new();

    state.set_running(false);
    if let Err(error) = active.capture.stop(true) {
        errors.push(RecorderError::stop("stop capture")(error));
    }

    match active.capture.codec_side_info() {
        Ok(Some(info)) => {
            if let Err(error) = state.apply_side_info(&info) {
                errors.push(RecorderError::stop("apply codec side info")(error));
            }
        }
        Ok(None) => {}
        Err(error) => errors.push(RecorderError::stop("read codec side info")(error)),
    }

    match active.capture.dispose() {
        Ok(slots) => {
            active.pool.reclaim(slots);
        }
        Err(error) => errors.push(RecorderError::stop("dispose capture session")(error)),
    }
    active.pool.reclaim(state.take_retired());

    if let Err(error) = state.close_sink() {
        errors.push(RecorderError::stop("close output file")(error));
    }

    let outstanding = active.pool.outstanding();
    if outstanding > 0 {
        log::warn!("{} of {} buffers were not returned", outstanding, active.pool.len());
    }

    let summary = SessionSummary {
        format: active.format,
        packets_written: state.next_packet_index(),
        bytes_written: state.bytes_written(),
        buffers_drained: state.buffers_drained(),
        elapsed: active.started_at.elapsed(),
        cause,
    };
    log::info!(
        "recorded {} packets ({} bytes) in {:.1}s",
        summary.packets_written,
        summary.bytes_written,
        summary.elapsed.as_secs_f64()
    );

    let mut errors = state.fault().into_iter().chain(errors);
    match errors.next() {
        Some(first) => {
            for secondary in errors {
                log::warn!("{}", secondary);
            }
            Err(first)
        }
        None => Ok(summary),
    }
}
