use crate::api::ApiClient;
use crate::config::Config;
use crate::render::{detection_card, render_list, watchlist_card, StatsView, ViewNode};
use crate::types::NewWatchlistEntry;
use failure::format_err;
use image::imageops::FilterType;
use image::GenericImageView;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fs;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

/// Asks the user to approve a destructive action.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Tells the user how an action went.
pub trait Notify: Send + Sync {
    fn notify(&self, message: &str);
}

impl<F> Notify for F
where
    F: Fn(&str) + Send + Sync,
{
    fn notify(&self, message: &str) {
        self(message)
    }
}

pub struct Prompts {
    pub confirm: Box<dyn Confirm>,
    pub notify: Box<dyn Notify>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    All,
    Today,
    Watchlist,
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(FilterMode::All),
            "today" => Ok(FilterMode::Today),
            "watchlist" => Ok(FilterMode::Watchlist),
            x => Err(format!("Unknown filter mode {}", x)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Detection,
    Watchlist,
    Compare,
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detection" => Ok(Tab::Detection),
            "watchlist" => Ok(Tab::Watchlist),
            "compare" => Ok(Tab::Compare),
            x => Err(format!("Unknown tab {}", x)),
        }
    }
}

/// Result of a user-triggered mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum Outcome {
    Cancelled,
    Invalid(String),
    Done(String),
    Failed(String),
}

/// Per-view request counter. A response is applied only if no response of
/// a later request has been applied to the same view already.
#[derive(Debug, Default)]
struct SequenceGuard {
    issued: u64,
    applied: u64,
}

impl SequenceGuard {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn accept(&mut self, ticket: u64) -> bool {
        if ticket < self.applied {
            return false;
        }
        self.applied = ticket;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Detections,
    Watchlist,
}

struct ViewSlot {
    node: ViewNode,
    guard: SequenceGuard,
}

impl ViewSlot {
    fn new(placeholder: &str) -> Self {
        ViewSlot {
            node: ViewNode::Loading(placeholder.to_string()),
            guard: SequenceGuard::default(),
        }
    }
}

struct State {
    stats: StatsView,
    stats_guard: SequenceGuard,
    detections: ViewSlot,
    watchlist: ViewSlot,
    filter: FilterMode,
    tab: Tab,
    add_dialog_open: bool,
    notice: Option<String>,
}

impl State {
    fn slot(&mut self, view: View) -> &mut ViewSlot {
        match view {
            View::Detections => &mut self.detections,
            View::Watchlist => &mut self.watchlist,
        }
    }
}

/// Everything currently on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub stats: StatsView,
    pub detections: ViewNode,
    pub watchlist: ViewNode,
    pub filter: FilterMode,
    pub tab: Tab,
    pub add_dialog_open: bool,
    pub notice: Option<String>,
}

/// Keeps the stats bar, the detection grid and the watchlist grid in sync
/// with the plate API. Every operation handles its own failures; none of
/// them can take the controller down.
pub struct Controller {
    api: ApiClient,
    prompts: Prompts,
    config: Config,
    state: Mutex<State>,
}

impl Controller {
    pub fn new(api: ApiClient, prompts: Prompts, config: Config) -> Self {
        Controller {
            api,
            prompts,
            config,
            state: Mutex::new(State {
                stats: StatsView::default(),
                stats_guard: SequenceGuard::default(),
                detections: ViewSlot::new("Loading data"),
                watchlist: ViewSlot::new("Loading watchlist"),
                filter: FilterMode::All,
                tab: Tab::Detection,
                add_dialog_open: false,
                notice: None,
            }),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;
        Snapshot {
            stats: state.stats.clone(),
            detections: state.detections.node.clone(),
            watchlist: state.watchlist.node.clone(),
            filter: state.filter,
            tab: state.tab,
            add_dialog_open: state.add_dialog_open,
            notice: state.notice.clone(),
        }
    }

    /// Initial page load.
    pub async fn start(&self) {
        futures::join!(
            self.refresh_stats(),
            self.refresh_detections(self.config.detection_limit)
        );
    }

    pub async fn check_health(&self) {
        match self.api.health().await {
            Ok(health) => info!(
                "API health: {} (database: {}, at {})",
                health.status,
                health.database,
                health.timestamp.as_deref().unwrap_or("?")
            ),
            Err(e) => warn!("API health check failed: {}", e),
        }
    }

    /// Polls the stats for as long as the process runs.
    pub async fn run_stats_timer(self: Arc<Self>) {
        let period = self.config.stats_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            self.refresh_stats().await;
        }
    }

    pub async fn refresh_stats(&self) {
        let ticket = self.state.lock().await.stats_guard.issue();
        let result = self.api.stats().await;
        let mut state = self.state.lock().await;
        if !state.stats_guard.accept(ticket) {
            debug!("Discarding superseded stats response {}", ticket);
            return;
        }
        match result {
            Ok(stats) => {
                state.stats = StatsView {
                    stats,
                    updated_at: Some(now_secs()),
                    error: None,
                };
            }
            Err(e) => {
                error!("Stats refresh failed: {}", e);
                state.stats.error = Some(e.to_string());
            }
        }
    }

    /// Shows a placeholder, then whatever `fetch` renders, unless a newer
    /// request for the same view got there first.
    async fn sync_view<F>(&self, view: View, placeholder: &str, fetch: F)
    where
        F: Future<Output = ViewNode>,
    {
        let ticket = {
            let mut state = self.state.lock().await;
            let slot = state.slot(view);
            let ticket = slot.guard.issue();
            slot.guard.accept(ticket);
            slot.node = ViewNode::Loading(placeholder.to_string());
            ticket
        };
        let node = fetch.await;
        if let ViewNode::Error(e) = &node {
            warn!("Failed to load {:?}: {}", view, e);
        }
        let mut state = self.state.lock().await;
        let slot = state.slot(view);
        if slot.guard.accept(ticket) {
            slot.node = node;
        } else {
            debug!("Discarding superseded {:?} response {}", view, ticket);
        }
    }

    pub async fn refresh_detections(&self, limit: usize) {
        let api = &self.api;
        self.sync_view(View::Detections, "Loading data", async move {
            render_list(api.recent(limit).await, "No records", |d| {
                detection_card(d, api.image_url(d.id))
            })
        })
        .await
    }

    pub async fn refresh_watchlist(&self) {
        let api = &self.api;
        self.sync_view(View::Watchlist, "Loading watchlist", async move {
            render_list(api.watchlist().await, "Watchlist is empty", watchlist_card)
        })
        .await
    }

    /// Blank queries show the most recent detections.
    pub async fn search(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return self.refresh_detections(self.config.detection_limit).await;
        }
        let api = &self.api;
        self.sync_view(View::Detections, "Searching", async move {
            render_list(api.search(query).await, "No matches", |d| {
                detection_card(d, api.image_url(d.id))
            })
        })
        .await
    }

    pub async fn clear_search(&self) {
        self.refresh_detections(self.config.detection_limit).await
    }

    pub async fn filter(&self, mode: FilterMode) {
        self.state.lock().await.filter = mode;
        let api = &self.api;
        match mode {
            FilterMode::All => self.refresh_detections(self.config.detection_limit).await,
            FilterMode::Today => {
                self.sync_view(View::Detections, "Loading today's data", async move {
                    render_list(api.today().await, "No records today", |d| {
                        detection_card(d, api.image_url(d.id))
                    })
                })
                .await
            }
            FilterMode::Watchlist => {
                self.sync_view(View::Detections, "Loading watchlist", async move {
                    render_list(api.watchlist().await, "Watchlist is empty", watchlist_card)
                })
                .await
            }
        }
    }

    pub async fn switch_tab(&self, tab: Tab) {
        self.state.lock().await.tab = tab;
        match tab {
            Tab::Detection => self.refresh_detections(self.config.detection_limit).await,
            Tab::Watchlist => self.refresh_watchlist().await,
            Tab::Compare => {}
        }
    }

    pub async fn open_add_dialog(&self) {
        self.state.lock().await.add_dialog_open = true;
    }

    pub async fn close_add_dialog(&self) {
        self.state.lock().await.add_dialog_open = false;
    }

    async fn notify(&self, message: &str) {
        self.prompts.notify.notify(message);
        self.state.lock().await.notice = Some(message.to_string());
    }

    pub async fn delete_detection(&self, id: i64) -> Outcome {
        if !self
            .prompts
            .confirm
            .confirm(&format!("Delete detection {}?", id))
        {
            return Outcome::Cancelled;
        }
        match self
            .api
            .delete_detection(id, &self.config.delete_reason)
            .await
        {
            Ok(message) => {
                info!("Deleted detection {}: {}", id, message);
                self.notify(&message).await;
                futures::join!(
                    self.refresh_stats(),
                    self.refresh_detections(self.config.detection_limit)
                );
                Outcome::Done(message)
            }
            Err(e) => {
                let message = format!("Delete failed: {}", e);
                warn!("{}", message);
                self.notify(&message).await;
                Outcome::Failed(message)
            }
        }
    }

    pub async fn add_watchlist_entry(&self, plate_number: &str, reason: &str) -> Outcome {
        let plate_number = plate_number.trim().to_uppercase();
        if plate_number.is_empty() {
            let message = "Please enter a plate number";
            self.notify(message).await;
            return Outcome::Invalid(message.to_string());
        }
        let entry = NewWatchlistEntry {
            plate_number,
            reason: reason.trim().to_string(),
            alert_type: "warning".to_string(),
        };
        match self.api.add_watchlist(&entry).await {
            Ok(_) => {
                let message = format!("Added {} to watchlist", entry.plate_number);
                info!("{}", message);
                self.close_add_dialog().await;
                self.notify(&message).await;
                futures::join!(self.refresh_watchlist(), self.refresh_stats());
                Outcome::Done(message)
            }
            Err(e) => {
                let message = format!("Add failed: {}", e);
                warn!("{}", message);
                self.notify(&message).await;
                Outcome::Failed(message)
            }
        }
    }

    pub async fn delete_watchlist_entry(&self, plate_number: &str) -> Outcome {
        if !self
            .prompts
            .confirm
            .confirm(&format!("Remove \"{}\" from watchlist?", plate_number))
        {
            return Outcome::Cancelled;
        }
        match self.api.delete_watchlist(plate_number).await {
            Ok(message) => {
                info!("Removed {} from watchlist: {}", plate_number, message);
                self.notify(&message).await;
                futures::join!(self.refresh_watchlist(), self.refresh_stats());
                Outcome::Done(message)
            }
            Err(e) => {
                let message = format!("Remove failed: {}", e);
                warn!("{}", message);
                self.notify(&message).await;
                Outcome::Failed(message)
            }
        }
    }

    /// Downloads the detection image, downscaled to fit 1024x768, into the
    /// image directory. `Done` carries the saved path.
    pub async fn view_plate(&self, id: i64) -> Outcome {
        if id == 0 {
            let message = "No image available";
            self.notify(message).await;
            return Outcome::Invalid(message.to_string());
        }
        let data = match self.api.image(id).await {
            Ok(data) => data,
            Err(e) => {
                let message = format!("Image unavailable: {}", e);
                warn!("{}", message);
                self.notify(&message).await;
                return Outcome::Failed(message);
            }
        };
        match self.save_image(&data) {
            Ok(path) => {
                info!("Saved image of detection {} to {}", id, path);
                Outcome::Done(path)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("{}", message);
                self.notify(&message).await;
                Outcome::Failed(message)
            }
        }
    }

    fn save_image(&self, data: &[u8]) -> Result<String, failure::Error> {
        let mut img = image::load_from_memory(data)
            .map_err(|e| format_err!("Failed to decode image: {}", e))?;
        if img.width() > 1024 || img.height() > 768 {
            img = img.resize(1024, 768, FilterType::Triangle);
        }
        fs::create_dir_all(&self.config.image_dir)
            .map_err(|e| format_err!("Cannot create {:?}: {}", self.config.image_dir, e))?;
        let name = format!("{:x}.jpeg", Uuid::new_v4().to_simple());
        let path = self.config.image_dir.join(&name);
        img.save(&path)
            .map_err(|e| format_err!("Error saving image to {:?}: {}", path, e))?;
        Ok(path.display().to_string())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::render::Command;
    use crate::transport::fake::FakeTransport;
    use crate::transport::Transport;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    pub fn test_config() -> Config {
        Config {
            base_url: Url::parse("http://localhost:5000").unwrap(),
            detection_limit: 20,
            stats_interval: Duration::from_secs(30),
            listen_port: 0,
            image_dir: std::env::temp_dir().join(format!("plates-{}", Uuid::new_v4())),
            delete_reason: "deleted_by_ui".to_string(),
        }
    }

    pub fn controller_with(fake: &Arc<FakeTransport>, answer: bool) -> Controller {
        let config = test_config();
        Controller::new(
            ApiClient::new(config.base_url.clone(), fake.clone() as Arc<dyn Transport>),
            Prompts {
                confirm: Box::new(move |_: &str| answer),
                notify: Box::new(|_: &str| {}),
            },
            config,
        )
    }

    fn two_detections() -> serde_json::Value {
        json!({
            "success": true,
            "count": 2,
            "data": [
                {"id": 1, "plate_number": "abc123", "timestamp": "2024-05-01 08:30:00", "confidence": 0.9},
                {"id": 2, "plate_number": "51g67890", "timestamp": "2024-05-01 08:29:00", "watchlist": true}
            ]
        })
    }

    fn stats(total: u64) -> serde_json::Value {
        json!({"success": true, "data": {
            "total": total, "unique": 4, "today": 2, "watchlist_count": 1, "alerts_pending": 0
        }})
    }

    #[tokio::test]
    async fn detections_render_one_card_per_record() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("GET api/plates/recent", 200, two_detections());
        let controller = controller_with(&fake, true);

        controller.refresh_detections(20).await;

        let snapshot = controller.snapshot().await;
        let cards = snapshot.detections.cards();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].title, "ABC123");
        assert_eq!(cards[1].title, "51G67890");
        assert_eq!(
            cards[0].image_url.as_deref(),
            Some("http://localhost:5000/api/image/1")
        );
        assert_eq!(
            fake.requests()[0].query,
            vec![("limit".to_string(), "20".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_and_failed_detections() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("GET api/plates/recent", 200, json!({"success": true, "count": 0, "data": []}));
        let controller = controller_with(&fake, true);
        controller.refresh_detections(20).await;
        assert_eq!(
            controller.snapshot().await.detections,
            ViewNode::Empty("No records".to_string())
        );

        let fake = Arc::new(FakeTransport::new());
        fake.reply(
            "GET api/plates/recent",
            200,
            json!({"success": false, "message": "Database not found"}),
        );
        let controller = controller_with(&fake, true);
        controller.refresh_detections(20).await;
        assert_eq!(
            controller.snapshot().await.detections,
            ViewNode::Error("Database not found".to_string())
        );
    }

    #[tokio::test]
    async fn transport_failure_is_shown_inline() {
        let fake = Arc::new(FakeTransport::new());
        fake.fail(
            "GET api/plates/recent",
            ApiError::Transport("connection reset".to_string()),
        );
        let controller = controller_with(&fake, true);
        controller.refresh_detections(20).await;
        assert_eq!(
            controller.snapshot().await.detections,
            ViewNode::Error("Cannot reach API: connection reset".to_string())
        );
    }

    #[tokio::test]
    async fn blank_search_is_a_plain_refresh() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("GET api/plates/recent", 200, two_detections());

        let searched = controller_with(&fake, true);
        searched.search("   ").await;
        let refreshed = controller_with(&fake, true);
        refreshed.refresh_detections(20).await;

        let requests = fake.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(searched.snapshot().await, refreshed.snapshot().await);
    }

    #[tokio::test]
    async fn search_sends_trimmed_query() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("GET api/plates/search", 200, json!({"success": true, "count": 0, "data": []}));
        let controller = controller_with(&fake, true);
        controller.search(" 29A ").await;
        assert_eq!(
            fake.requests()[0].query,
            vec![("q".to_string(), "29A".to_string())]
        );
        assert_eq!(
            controller.snapshot().await.detections,
            ViewNode::Empty("No matches".to_string())
        );
    }

    #[tokio::test]
    async fn failed_stats_keep_previous_counters() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("GET api/stats", 200, stats(10));
        fake.reply_raw("GET api/stats", 502, b"Bad Gateway");
        let controller = controller_with(&fake, true);

        controller.refresh_stats().await;
        let before = controller.snapshot().await.stats;
        assert_eq!(before.stats.total, 10);
        assert!(before.error.is_none());

        controller.refresh_stats().await;
        let after = controller.snapshot().await.stats;
        assert_eq!(after.stats, before.stats);
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(after.error.as_deref(), Some("HTTP 502: Bad Gateway"));
    }

    #[tokio::test]
    async fn confirmed_delete_resyncs_once() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("DELETE api/plates/1", 200, json!({"success": true, "message": "Deleted"}));
        fake.reply("GET api/stats", 200, stats(9));
        fake.reply("GET api/plates/recent", 200, two_detections());
        let controller = controller_with(&fake, true);

        let outcome = controller.delete_detection(1).await;

        assert_eq!(outcome, Outcome::Done("Deleted".to_string()));
        assert_eq!(fake.count("GET api/stats"), 1);
        assert_eq!(fake.count("GET api/plates/recent"), 1);
        assert_eq!(
            fake.requests()[0].query,
            vec![("reason".to_string(), "deleted_by_ui".to_string())]
        );
        assert_eq!(controller.snapshot().await.notice.as_deref(), Some("Deleted"));
    }

    #[tokio::test]
    async fn declined_delete_sends_nothing() {
        let fake = Arc::new(FakeTransport::new());
        let controller = controller_with(&fake, false);
        assert_eq!(controller.delete_detection(1).await, Outcome::Cancelled);
        assert_eq!(controller.delete_watchlist_entry("30A11111").await, Outcome::Cancelled);
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_leaves_views_alone() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("GET api/plates/recent", 200, two_detections());
        fake.reply_raw("DELETE api/plates/1", 500, b"oops");
        let controller = controller_with(&fake, true);
        controller.refresh_detections(20).await;
        let before = controller.snapshot().await.detections;

        let outcome = controller.delete_detection(1).await;

        assert_eq!(outcome, Outcome::Failed("Delete failed: HTTP 500: oops".to_string()));
        assert_eq!(controller.snapshot().await.detections, before);
        assert_eq!(fake.count("GET api/plates/recent"), 1);
        assert_eq!(fake.count("GET api/stats"), 0);
    }

    #[tokio::test]
    async fn empty_plate_never_hits_the_network() {
        let fake = Arc::new(FakeTransport::new());
        let notified = Arc::new(AtomicBool::new(false));
        let flag = notified.clone();
        let config = test_config();
        let controller = Controller::new(
            ApiClient::new(config.base_url.clone(), fake.clone() as Arc<dyn Transport>),
            Prompts {
                confirm: Box::new(|_: &str| true),
                notify: Box::new(move |_: &str| flag.store(true, Ordering::SeqCst)),
            },
            config,
        );

        let outcome = controller.add_watchlist_entry("", "spam").await;

        assert_eq!(outcome, Outcome::Invalid("Please enter a plate number".to_string()));
        assert!(fake.requests().is_empty());
        assert!(notified.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn add_normalises_and_closes_dialog() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("POST api/watchlist", 200, json!({"success": true, "message": "ok"}));
        fake.reply(
            "GET api/watchlist",
            200,
            json!({"success": true, "count": 1, "data": [
                {"plate_number": "30A11111", "reason": "stolen", "added_date": "2024-05-01", "detection_count": 0}
            ]}),
        );
        fake.reply("GET api/stats", 200, stats(3));
        let controller = controller_with(&fake, true);
        controller.open_add_dialog().await;

        let outcome = controller.add_watchlist_entry(" 30a11111 ", " stolen ").await;

        assert_eq!(outcome, Outcome::Done("Added 30A11111 to watchlist".to_string()));
        assert_eq!(
            fake.requests()[0].body,
            Some(json!({"plate_number": "30A11111", "reason": "stolen", "alert_type": "warning"}))
        );
        let snapshot = controller.snapshot().await;
        assert!(!snapshot.add_dialog_open);
        assert_eq!(snapshot.watchlist.cards()[0].title, "30A11111");
        assert_eq!(fake.count("GET api/stats"), 1);
    }

    #[tokio::test]
    async fn add_rejection_keeps_dialog_open() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply(
            "POST api/watchlist",
            400,
            json!({"success": false, "message": "Plate already in watchlist"}),
        );
        let controller = controller_with(&fake, true);
        controller.open_add_dialog().await;

        let outcome = controller.add_watchlist_entry("30A11111", "").await;

        match outcome {
            Outcome::Failed(message) => assert!(message.contains("Plate already in watchlist")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(controller.snapshot().await.add_dialog_open);
        assert_eq!(fake.count("GET api/watchlist"), 0);
    }

    #[tokio::test]
    async fn watchlist_delete_refreshes_watchlist_and_stats() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply(
            "DELETE api/watchlist/30A11111",
            200,
            json!({"success": true, "message": "Removed 30A11111"}),
        );
        fake.reply("GET api/watchlist", 200, json!({"success": true, "count": 0, "data": []}));
        fake.reply("GET api/stats", 200, stats(3));
        let prompts = Arc::new(AtomicUsize::new(0));
        let seen = prompts.clone();
        let config = test_config();
        let controller = Controller::new(
            ApiClient::new(config.base_url.clone(), fake.clone() as Arc<dyn Transport>),
            Prompts {
                confirm: Box::new(move |prompt: &str| {
                    assert!(prompt.contains("30A11111"));
                    seen.fetch_add(1, Ordering::SeqCst);
                    true
                }),
                notify: Box::new(|_: &str| {}),
            },
            config,
        );

        let outcome = controller.delete_watchlist_entry("30A11111").await;

        assert_eq!(outcome, Outcome::Done("Removed 30A11111".to_string()));
        assert_eq!(prompts.load(Ordering::SeqCst), 1);
        assert_eq!(fake.count("GET api/watchlist"), 1);
        assert_eq!(fake.count("GET api/stats"), 1);
        assert_eq!(
            controller.snapshot().await.watchlist,
            ViewNode::Empty("Watchlist is empty".to_string())
        );
    }

    #[tokio::test]
    async fn filters_pick_their_endpoint() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("GET api/stats/today", 200, two_detections());
        fake.reply(
            "GET api/watchlist",
            200,
            json!({"success": true, "count": 1, "data": [{"plate_number": "30a11111", "detection_count": 2}]}),
        );
        let controller = controller_with(&fake, true);

        controller.filter(FilterMode::Today).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.filter, FilterMode::Today);
        assert_eq!(snapshot.detections.cards().len(), 2);

        controller.filter(FilterMode::Watchlist).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.filter, FilterMode::Watchlist);
        assert_eq!(
            snapshot.detections.cards()[0].actions[0].command,
            Command::DeleteWatchlist("30a11111".to_string())
        );
    }

    #[tokio::test]
    async fn switching_tabs_loads_the_tab() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply("GET api/watchlist", 200, json!({"success": true, "data": []}));
        let controller = controller_with(&fake, true);

        controller.switch_tab(Tab::Watchlist).await;
        controller.switch_tab(Tab::Compare).await;

        assert_eq!(fake.requests().len(), 1);
        assert_eq!(controller.snapshot().await.tab, Tab::Compare);
    }

    #[tokio::test]
    async fn view_plate_without_id() {
        let fake = Arc::new(FakeTransport::new());
        let controller = controller_with(&fake, true);
        assert_eq!(
            controller.view_plate(0).await,
            Outcome::Invalid("No image available".to_string())
        );
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn view_plate_saves_image() {
        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(4, 2)
            .write_to(&mut png, image::ImageOutputFormat::Png)
            .unwrap();
        let fake = Arc::new(FakeTransport::new());
        fake.reply_bytes("GET api/image/7", 200, png);
        let controller = controller_with(&fake, true);

        match controller.view_plate(7).await {
            Outcome::Done(path) => {
                let path = PathBuf::from(path);
                assert!(path.exists());
                assert_eq!(image::open(&path).unwrap().dimensions(), (4, 2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn undecodable_image_fails() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply_raw("GET api/image/5", 200, b"not an image");
        let controller = controller_with(&fake, true);

        match controller.view_plate(5).await {
            Outcome::Failed(message) => assert!(message.starts_with("Failed to decode image")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            controller.snapshot().await.notice.map(|n| n.starts_with("Failed to decode image")),
            Some(true)
        );
    }

    #[tokio::test]
    async fn slow_refresh_does_not_override_newer_search() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply_after(
            "GET api/plates/recent",
            Duration::from_millis(200),
            200,
            two_detections(),
        );
        fake.reply_after(
            "GET api/plates/search",
            Duration::from_millis(10),
            200,
            json!({"success": true, "count": 1, "data": [{"id": 9, "plate_number": "29a55555"}]}),
        );
        let controller = controller_with(&fake, true);

        futures::join!(controller.refresh_detections(20), async {
            tokio::time::delay_for(Duration::from_millis(20)).await;
            controller.search("29A").await
        });

        let snapshot = controller.snapshot().await;
        let titles: Vec<_> = snapshot
            .detections
            .cards()
            .iter()
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(titles, vec!["29A55555"]);
    }

    #[tokio::test]
    async fn older_stats_response_is_discarded() {
        let fake = Arc::new(FakeTransport::new());
        fake.reply_after("GET api/stats", Duration::from_millis(200), 200, stats(1));
        fake.reply_after("GET api/stats", Duration::from_millis(10), 200, stats(2));
        let controller = controller_with(&fake, true);

        futures::join!(controller.refresh_stats(), async {
            tokio::time::delay_for(Duration::from_millis(20)).await;
            controller.refresh_stats().await
        });

        assert_eq!(fake.count("GET api/stats"), 2);
        let view = controller.snapshot().await.stats;
        assert_eq!(view.stats.total, 2);
        assert!(view.error.is_none());
    }

    #[test]
    fn guard_discards_superseded_tickets() {
        let mut guard = SequenceGuard::default();
        let first = guard.issue();
        let second = guard.issue();
        assert!(guard.accept(second));
        assert!(!guard.accept(first));
        assert!(guard.accept(second));
        let third = guard.issue();
        assert!(guard.accept(third));
    }

    #[test]
    fn modes_and_tabs_parse() {
        assert_eq!("today".parse::<FilterMode>(), Ok(FilterMode::Today));
        assert!("yesterday".parse::<FilterMode>().is_err());
        assert_eq!("watchlist".parse::<Tab>(), Ok(Tab::Watchlist));
    }
}
