//! Log-based telemetry and display adapters.
//!
//! Implement [`TelemetrySink`] and [`DisplaySink`] by writing to the
//! ESP-IDF logger (UART / USB-CDC in production).  A broker client or an
//! OLED driver would implement the same traits.

use log::{debug, info};

use crate::app::ports::{DisplaySink, TelemetryError, TelemetrySink};
use crate::fsm::context::DisplayLine;
use crate::sensors::sample::SpectralSample;

/// Rows on the reference 128x64 OLED in 8x8 text mode.
pub const DISPLAY_ROWS: usize = 8;

// ── Telemetry ─────────────────────────────────────────────────

/// Adapter that logs every published sample as one JSON object.
#[derive(Debug, Default)]
pub struct LogTelemetrySink {
    published: u32,
}

impl LogTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u32 {
        self.published
    }
}

/// JSON document for a sample: channel label → calibrated value.
pub fn encode_sample(sample: &SpectralSample) -> Result<String, TelemetryError> {
    serde_json::to_string(sample).map_err(|_| TelemetryError::Encode)
}

impl TelemetrySink for LogTelemetrySink {
    fn publish(&mut self, sample: &SpectralSample) -> Result<(), TelemetryError> {
        let json = encode_sample(sample)?;
        info!(
            "TELEM | degraded={} | {}",
            sample.degraded_count(),
            json
        );
        self.published += 1;
        Ok(())
    }
}

// ── Display ───────────────────────────────────────────────────

/// Text-mode display mirrored into the log, keeping the current frame.
#[derive(Debug, Default)]
pub struct LogDisplay {
    rows: [DisplayLine; DISPLAY_ROWS],
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents of `row` (empty when out of range).
    pub fn row(&self, row: u8) -> &str {
        self.rows.get(row as usize).map_or("", DisplayLine::as_str)
    }
}

impl DisplaySink for LogDisplay {
    fn clear(&mut self) {
        debug!("DISPLAY | clear");
        for row in &mut self.rows {
            row.clear();
        }
    }

    fn print(&mut self, row: u8, col: u8, text: &str) {
        let Some(line) = self.rows.get_mut(row as usize) else {
            return;
        };
        // Text written at a column replaces the rest of the row.
        let keep: String = line.chars().take(col as usize).collect();
        line.clear();
        for ch in keep.chars().chain(core::iter::repeat(' ')).take(col as usize) {
            let _ = line.push(ch);
        }
        for ch in text.chars() {
            if line.push(ch).is_err() {
                break;
            }
        }
        info!("DISPLAY | [{}] {}", row, line);
    }
}
