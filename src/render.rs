//! Maps API records to view nodes.
//!
//! Nothing here touches the network or any rendering target: a view is a
//! plain value that the surface serialises, which keeps the render policy
//! testable on its own.

use crate::error::ApiError;
use crate::types::{Detection, Stats, WatchlistEntry};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "content", rename_all = "snake_case")]
pub enum ViewNode {
    Loading(String),
    Empty(String),
    Error(String),
    Grid(Vec<Card>),
}

impl ViewNode {
    pub fn cards(&self) -> &[Card] {
        match self {
            ViewNode::Grid(cards) => cards,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Card {
    pub title: String,
    pub highlighted: bool,
    pub badge: Option<String>,
    pub fields: Vec<Field>,
    pub image_url: Option<String>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub label: &'static str,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Command {
    ViewImage(i64),
    DeleteDetection(i64),
    DeleteWatchlist(String),
}

fn field(label: &'static str, value: impl Into<String>) -> Field {
    Field {
        label,
        value: value.into(),
    }
}

fn or_na(value: &Option<String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.clone(),
        _ => "N/A".to_string(),
    }
}

pub fn format_confidence(confidence: Option<f64>) -> String {
    match confidence {
        Some(c) => format!("{}%", (c * 100.0).round()),
        None => "N/A".to_string(),
    }
}

/// `image_url` is resolved by the caller so cards stay independent of the
/// API base.
pub fn detection_card(detection: &Detection, image_url: Option<String>) -> Card {
    let title = match &detection.plate_number {
        Some(p) if !p.is_empty() => p.to_uppercase(),
        _ => "--".to_string(),
    };
    Card {
        title,
        highlighted: detection.watchlist,
        badge: if detection.watchlist {
            Some("WATCHLIST".to_string())
        } else {
            None
        },
        fields: vec![
            field("ID", detection.id.to_string()),
            field("Time", detection.timestamp.clone().unwrap_or_default()),
            field("Confidence", format_confidence(detection.confidence)),
        ],
        image_url: if detection.id != 0 { image_url } else { None },
        actions: vec![
            Action {
                label: "View",
                command: Command::ViewImage(detection.id),
            },
            Action {
                label: "Delete",
                command: Command::DeleteDetection(detection.id),
            },
        ],
    }
}

pub fn watchlist_card(entry: &WatchlistEntry) -> Card {
    Card {
        title: entry.plate_number.to_uppercase(),
        highlighted: true,
        badge: None,
        fields: vec![
            field("Reason", or_na(&entry.reason)),
            field("Added", or_na(&entry.added_date)),
            field("Detections", format!("{} times", entry.detection_count.unwrap_or(0))),
        ],
        image_url: None,
        actions: vec![Action {
            label: "Remove from watchlist",
            command: Command::DeleteWatchlist(entry.plate_number.clone()),
        }],
    }
}

/// One card per record in input order, the empty-state for no records, the
/// error state for any failure.
pub fn render_list<T, F>(result: Result<Vec<T>, ApiError>, empty: &str, card: F) -> ViewNode
where
    F: Fn(&T) -> Card,
{
    match result {
        Ok(records) if records.is_empty() => ViewNode::Empty(empty.to_string()),
        Ok(records) => ViewNode::Grid(records.iter().map(card).collect()),
        Err(e) => ViewNode::Error(e.to_string()),
    }
}

/// The stats bar. Counters keep their previous values when a refresh fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsView {
    pub stats: Stats,
    /// Seconds since the Unix epoch of the last successful refresh.
    pub updated_at: Option<u64>,
    pub error: Option<String>,
}
