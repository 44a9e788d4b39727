// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Trip CSV exporter
///
/// Serializes a finished sample buffer into the trip CSV format and hands the
/// bytes to an export sink.
///
/// # Format
///
/// ```text
/// timestamp,label,phone_position,acc_x,acc_y,acc_z,gps_speed,latitude,longitude
/// 1718000000000,Cruising,Mount (Fixed),0.01,-0.2,9.81,,0.0,0.0
/// 1718000000020,Braking,Mount (Fixed),-1.5,0.1,9.79,12.4,37.7749,-122.4194
/// ```
///
/// - one header row, then one row per sample in buffer order
/// - `\n` after every row
/// - numbers in shortest round-trip decimal form
/// - an absent GPS speed is an empty field
/// - labels and positions are written verbatim; every wire string is comma-free
///   so no field is ever quoted
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::buffer::AnnotatedSample;
use crate::error::{RecorderError, Result};
use crate::label::{Maneuver, PhonePosition};
use crate::sensors::AccelReading;
use crate::storage::ExportSink;

pub const CSV_HEADER: [&str; 9] = [
    "timestamp",
    "label",
    "phone_position",
    "acc_x",
    "acc_y",
    "acc_z",
    "gps_speed",
    "latitude",
    "longitude",
];

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    timestamp: i64,
    label: Maneuver,
    phone_position: PhonePosition,
    acc_x: f64,
    acc_y: f64,
    acc_z: f64,
    gps_speed: Option<f64>,
    latitude: f64,
    longitude: f64,
}

impl From<&AnnotatedSample> for CsvRow {
    fn from(sample: &AnnotatedSample) -> Self {
        Self {
            timestamp: sample.timestamp,
            label: sample.label,
            phone_position: sample.phone_position,
            acc_x: sample.accel.x,
            acc_y: sample.accel.y,
            acc_z: sample.accel.z,
            gps_speed: sample.gps_speed,
            latitude: sample.gps_lat,
            longitude: sample.gps_lon,
        }
    }
}

impl From<CsvRow> for AnnotatedSample {
    fn from(row: CsvRow) -> Self {
        Self {
            timestamp: row.timestamp,
            label: row.label,
            phone_position: row.phone_position,
            accel: AccelReading::new(row.acc_x, row.acc_y, row.acc_z),
            gps_speed: row.gps_speed,
            gps_lat: row.latitude,
            gps_lon: row.longitude,
        }
    }
}

/// Suggested file name for an export finished at `epoch_ms`
pub fn export_file_name(epoch_ms: i64) -> String {
    format!("trip_{}.csv", epoch_ms)
}

/// A serialized session waiting for (or after) handoff
#[derive(Debug, Clone)]
pub struct TripExport {
    pub file_name: String,
    pub data: Vec<u8>,
    pub sample_count: usize,
    /// Session metadata stored next to the file by sinks that support it
    pub labels: HashMap<String, String>,
}

pub struct CsvExporter {
    sink: Arc<dyn ExportSink>,
}

impl CsvExporter {
    pub fn new(sink: Arc<dyn ExportSink>) -> Self {
        Self { sink }
    }

    /// Encode samples as trip CSV.
    ///
    /// Deterministic: the same samples always produce the same bytes.
    pub fn serialize(samples: &[AnnotatedSample]) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::with_capacity(64 * (samples.len() + 1)));

        writer.write_record(CSV_HEADER)?;
        for sample in samples {
            writer.serialize(CsvRow::from(sample))?;
        }

        let data = writer
            .into_inner()
            .map_err(|e| RecorderError::Io(e.into_error()))?;
        debug!("Serialized {} samples into {} bytes", samples.len(), data.len());
        Ok(data)
    }

    /// Decode trip CSV back into samples
    pub fn parse(data: &[u8]) -> Result<Vec<AnnotatedSample>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(data);

        let headers = reader.headers()?;
        if headers.iter().ne(CSV_HEADER.iter().copied()) {
            return Err(RecorderError::MalformedCsv(format!(
                "unexpected header '{}'",
                headers.iter().collect::<Vec<_>>().join(",")
            )));
        }

        reader
            .deserialize::<CsvRow>()
            .map(|row| row.map(AnnotatedSample::from).map_err(RecorderError::from))
            .collect()
    }

    /// Pass a finished export to the sink.
    ///
    /// Any sink failure becomes `SinkUnavailable`; the export itself is left
    /// untouched so the caller can hand it off again.
    pub async fn handoff(&self, export: &TripExport) -> Result<PathBuf> {
        if !self.sink.is_available().await {
            error!(
                "Export sink '{}' unavailable, keeping {} for retry",
                self.sink.backend_type(),
                export.file_name
            );
            return Err(RecorderError::SinkUnavailable(format!(
                "{} sink is not available on this device",
                self.sink.backend_type()
            )));
        }

        let location = self
            .sink
            .write_export(&export.file_name, &export.data, &export.labels)
            .await
            .map_err(|e| {
                error!("Handoff of {} failed: {:#}", export.file_name, e);
                RecorderError::SinkUnavailable(format!("{:#}", e))
            })?;

        info!(
            "Exported {} samples ({} bytes) to {}",
            export.sample_count,
            export.data.len(),
            location.display()
        );
        Ok(location)
    }

    pub fn sink(&self) -> &Arc<dyn ExportSink> {
        &self.sink
    }
}
