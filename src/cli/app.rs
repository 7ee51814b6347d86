//! Main app runner for recording mode

use std::process::ExitCode;

use crate::application::ports::{CaptureBackend, ConfigStore, FormatNegotiator, SinkFactory};
use crate::application::{
    ErrorKind, RecorderError, RecordingPipeline, SessionOptions, SessionSummary, StopCause,
};
use crate::domain::config::AppConfig;
use crate::domain::recording::{Codec, ContainerFormat, Duration};
use crate::infrastructure::{CpalCaptureBackend, CpalFormatNegotiator, FileSinkFactory, XdgConfigStore};

use super::args::Cli;
use super::presenter::Presenter;
use super::signals::stop_trigger;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;
pub const EXIT_SETUP_ERROR: u8 = 3;
pub const EXIT_WRITE_ERROR: u8 = 4;
pub const EXIT_RESUBMIT_ERROR: u8 = 5;
pub const EXIT_STOP_ERROR: u8 = 6;

/// How often the progress line refreshes
const PROGRESS_INTERVAL: std::time::Duration = std::time::Duration::from_millis(250);

/// Map a pipeline failure to the process exit code
pub fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Setup => EXIT_SETUP_ERROR,
        ErrorKind::Write => EXIT_WRITE_ERROR,
        ErrorKind::Resubmit => EXIT_RESUBMIT_ERROR,
        ErrorKind::Stop => EXIT_STOP_ERROR,
        ErrorKind::InvalidState => EXIT_ERROR,
    }
}

/// Parsed recording options
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOptions {
    pub session: SessionOptions,
    pub max_duration: Option<Duration>,
}

impl RecordOptions {
    /// Validate a merged config.
    ///
    /// Unlike the config accessors, invalid values are reported rather
    /// than replaced by defaults.
    pub fn from_config(config: &AppConfig) -> Result<Self, String> {
        let container = match config.container.as_deref() {
            Some(s) => s.parse::<ContainerFormat>().map_err(|e| e.to_string())?,
            None => ContainerFormat::default(),
        };
        let codec = match config.codec.as_deref() {
            Some(s) => s.parse::<Codec>().map_err(|e| e.to_string())?,
            None => Codec::default(),
        };
        container.check_codec(codec).map_err(|e| e.to_string())?;

        let buffer_duration = match config.buffer_duration.as_deref() {
            Some(s) => s
                .parse::<Duration>()
                .map_err(|e| format!("Invalid buffer-duration: {}", e))?,
            None => Duration::default_buffer_duration(),
        };
        let max_duration = config
            .max_duration
            .as_deref()
            .map(|s| s.parse::<Duration>())
            .transpose()
            .map_err(|e| format!("Invalid max-duration: {}", e))?;

        let channels = config.channels_or_default();
        if channels == 0 {
            return Err("Channel count must be at least 1".to_string());
        }
        let buffer_count = config.buffer_count_or_default();
        if buffer_count == 0 {
            return Err("Buffer count must be at least 1".to_string());
        }

        Ok(Self {
            session: SessionOptions {
                output_path: config.output_or_default(),
                container,
                codec,
                channels,
                buffer_count,
                buffer_duration,
            },
            max_duration,
        })
    }
}

/// Config values given on the command line
pub fn cli_config(cli: &Cli) -> AppConfig {
    AppConfig {
        output: cli.output.clone(),
        container: cli
            .container
            .map(|c| ContainerFormat::from(c).to_string()),
        codec: cli.codec.map(|c| Codec::from(c).to_string()),
        channels: cli.channels,
        buffer_count: cli.buffer_count.map(|n| n as usize),
        buffer_duration: cli.buffer_duration.clone(),
        max_duration: cli.max_duration.clone(),
    }
}

/// Load and merge configuration from file and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load_or_empty().await;

    // Merge: defaults < file < cli
    AppConfig::defaults().merge(file_config).merge(cli_config)
}

/// Record until Enter, an interrupt, the time limit, or a failure
pub async fn run_recording(options: RecordOptions) -> ExitCode {
    let mut presenter = Presenter::new();
    let mut pipeline = RecordingPipeline::new(
        CpalFormatNegotiator::new(),
        CpalCaptureBackend::new(),
        FileSinkFactory::new(),
    );

    let format = match pipeline.start(&options.session) {
        Ok(format) => format,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(exit_code(e.kind()));
        }
    };
    presenter.info(&format!(
        "Recording {} to {}",
        format,
        options.session.output_path.display()
    ));
    presenter.start_spinner("Recording... (Enter to stop)");

    let limit_ms = options.max_duration.map(|d| d.as_millis());
    let cause = {
        let pipeline = &pipeline;
        let presenter = &presenter;
        let trigger = async {
            let stop = stop_trigger(options.max_duration);
            tokio::pin!(stop);
            let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
            loop {
                tokio::select! {
                    cause = &mut stop => break cause,
                    _ = ticker.tick() => presenter.update_recording_progress(
                        pipeline.elapsed().as_millis() as u64,
                        limit_ms,
                        pipeline.packets_written(),
                    ),
                }
            }
        };
        pipeline.wait_for_stop(trigger).await
    };
    pipeline.record_cause(cause);

    match stop_pipeline(pipeline).await {
        Ok(summary) => {
            presenter.spinner_success(&completion_message(&summary));
            presenter.success(&format!("Saved {}", options.session.output_path.display()));
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.spinner_fail("Recording failed");
            presenter.error(&e.to_string());
            ExitCode::from(exit_code(e.kind()))
        }
    }
}

/// Stop on the blocking pool; stopping joins the capture threads
pub async fn stop_pipeline<N, B, F>(
    mut pipeline: RecordingPipeline<N, B, F>,
) -> Result<SessionSummary, RecorderError>
where
    N: FormatNegotiator + Send + 'static,
    B: CaptureBackend + Send + 'static,
    B::Session: 'static,
    F: SinkFactory + Send + 'static,
{
    tokio::task::spawn_blocking(move || pipeline.stop())
        .await
        .map_err(RecorderError::stop("stop capture"))?
}

fn completion_message(summary: &SessionSummary) -> String {
    let reason = match summary.cause {
        StopCause::Requested => "stopped",
        StopCause::Interrupted => "interrupted",
        StopCause::TimeLimit => "time limit reached",
        StopCause::Fault => "stopped after an error",
    };
    format!(
        "Recording {} after {:.1}s: {} packets, {}",
        reason,
        summary.elapsed.as_secs_f64(),
        summary.packets_written,
        format_size(summary.bytes_written)
    )
}

/// Human-readable byte count
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    let size = bytes as f64;
    if size >= MIB {
        format!("{:.1} MB", size / MIB)
    } else if size >= KIB {
        format!("{:.1} KB", size / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}
