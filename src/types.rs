use crate::error::ApiError;
use serde::{Deserialize, Serialize};

/// The `{success, message, data, count}` wrapper every JSON endpoint uses.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    pub count: Option<usize>,
}

impl<T> Envelope<T> {
    fn check_success(&mut self) -> Result<(), ApiError> {
        if self.success {
            Ok(())
        } else {
            Err(ApiError::Application(
                self.message
                    .take()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }

    /// Payload of a single-object endpoint such as `/api/stats`.
    pub fn into_data(mut self) -> Result<T, ApiError> {
        self.check_success()?;
        self.data
            .ok_or_else(|| ApiError::Malformed("missing data in successful response".to_string()))
    }

    /// Message of an action endpoint (delete, add).
    pub fn into_message(mut self, fallback: &str) -> Result<String, ApiError> {
        self.check_success()?;
        Ok(self.message.unwrap_or_else(|| fallback.to_string()))
    }
}

impl<T> Envelope<Vec<T>> {
    /// Records of a list endpoint. Absent data means an empty list; a
    /// `count` that disagrees with the data is a malformed response.
    pub fn into_records(mut self) -> Result<Vec<T>, ApiError> {
        self.check_success()?;
        let records = self.data.unwrap_or_default();
        match self.count {
            Some(count) if count != records.len() => Err(ApiError::Malformed(format!(
                "count {} does not match {} records",
                count,
                records.len()
            ))),
            _ => Ok(records),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: i64,
    #[serde(default)]
    pub plate_number: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub watchlist: bool,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub plate_number: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub added_date: Option<String>,
    #[serde(default)]
    pub detection_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default, alias = "total_detections")]
    pub total: u64,
    #[serde(default, alias = "unique_plates")]
    pub unique: u64,
    #[serde(default)]
    pub today: u64,
    #[serde(default)]
    pub watchlist_count: u64,
    #[serde(default)]
    pub alerts_pending: u64,
    #[serde(default)]
    pub top_plates: Vec<TopPlate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPlate {
    #[serde(alias = "plate_number")]
    pub plate: String,
    pub count: u64,
}

/// Body of `POST /api/watchlist`.
#[derive(Debug, Clone, Serialize)]
pub struct NewWatchlistEntry {
    pub plate_number: String,
    pub reason: String,
    pub alert_type: String,
}

/// `/api/health` is the one endpoint without an envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub database: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}
