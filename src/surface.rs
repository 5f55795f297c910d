use crate::controller::{Controller, FilterMode, Outcome, Snapshot, Tab};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Deserialize)]
struct WatchlistForm {
    plate_number: String,
    #[serde(default)]
    reason: String,
}

#[derive(Serialize)]
struct ActionReply {
    result: Outcome,
    views: Snapshot,
}

pub async fn run(controller: Arc<Controller>, port: u16) {
    info!("Serving dashboard views on 127.0.0.1:{}", port);
    warp::serve(routes(controller)).run(([127, 0, 0, 1], port)).await;
}

pub fn routes(
    controller: Arc<Controller>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let with_controller = warp::any().map(move || controller.clone());

    let views = warp::get()
        .and(warp::path!("views"))
        .and(with_controller.clone())
        .and_then(|c: Arc<Controller>| async move { snapshot_reply(&c).await });
    let refresh = warp::post()
        .and(warp::path!("refresh"))
        .and(with_controller.clone())
        .and_then(|c: Arc<Controller>| async move {
            c.start().await;
            snapshot_reply(&c).await
        });
    let search = warp::post()
        .and(warp::path!("search"))
        .and(warp::query::<SearchQuery>())
        .and(with_controller.clone())
        .and_then(|query: SearchQuery, c: Arc<Controller>| async move {
            c.search(&query.q).await;
            snapshot_reply(&c).await
        });
    let clear_search = warp::post()
        .and(warp::path!("search" / "clear"))
        .and(with_controller.clone())
        .and_then(|c: Arc<Controller>| async move {
            c.clear_search().await;
            snapshot_reply(&c).await
        });
    let open_dialog = warp::post()
        .and(warp::path!("dialog" / "add"))
        .and(with_controller.clone())
        .and_then(|c: Arc<Controller>| async move {
            c.open_add_dialog().await;
            snapshot_reply(&c).await
        });
    let close_dialog = warp::delete()
        .and(warp::path!("dialog" / "add"))
        .and(with_controller.clone())
        .and_then(|c: Arc<Controller>| async move {
            c.close_add_dialog().await;
            snapshot_reply(&c).await
        });
    let filter = warp::post()
        .and(warp::path!("filter" / String))
        .and(with_controller.clone())
        .and_then(filter_detections);
    let tab = warp::post()
        .and(warp::path!("tab" / String))
        .and(with_controller.clone())
        .and_then(switch_tab);
    let delete_detection = warp::delete()
        .and(warp::path!("detections" / i64))
        .and(with_controller.clone())
        .and_then(|id: i64, c: Arc<Controller>| async move {
            let result = c.delete_detection(id).await;
            action_reply(&c, result).await
        });
    let view_image = warp::post()
        .and(warp::path!("detections" / i64 / "image"))
        .and(with_controller.clone())
        .and_then(|id: i64, c: Arc<Controller>| async move {
            let result = c.view_plate(id).await;
            action_reply(&c, result).await
        });
    let add_watchlist = warp::post()
        .and(warp::path!("watchlist"))
        .and(warp::body::json())
        .and(with_controller.clone())
        .and_then(|form: WatchlistForm, c: Arc<Controller>| async move {
            let result = c.add_watchlist_entry(&form.plate_number, &form.reason).await;
            action_reply(&c, result).await
        });
    let delete_watchlist = warp::delete()
        .and(warp::path!("watchlist" / String))
        .and(with_controller)
        .and_then(|plate: String, c: Arc<Controller>| async move {
            let result = c.delete_watchlist_entry(&plate).await;
            action_reply(&c, result).await
        });

    views
        .or(refresh)
        .or(search)
        .or(clear_search)
        .or(open_dialog)
        .or(close_dialog)
        .or(filter)
        .or(tab)
        .or(delete_detection)
        .or(view_image)
        .or(add_watchlist)
        .or(delete_watchlist)
}

async fn snapshot_reply(c: &Controller) -> Result<warp::reply::Json, Rejection> {
    Ok(warp::reply::json(&c.snapshot().await))
}

async fn action_reply(
    c: &Controller,
    result: Outcome,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Rejection> {
    let status = match &result {
        Outcome::Invalid(_) => StatusCode::BAD_REQUEST,
        Outcome::Failed(_) => StatusCode::BAD_GATEWAY,
        Outcome::Cancelled | Outcome::Done(_) => StatusCode::OK,
    };
    let reply = ActionReply {
        result,
        views: c.snapshot().await,
    };
    Ok(warp::reply::with_status(warp::reply::json(&reply), status))
}

fn bad_request(message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    error!("Rejected request: {}", message);
    warp::reply::with_status(
        warp::reply::json(&json!({ "error": message })),
        StatusCode::BAD_REQUEST,
    )
}

async fn filter_detections(
    mode: String,
    c: Arc<Controller>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Rejection> {
    match mode.parse::<FilterMode>() {
        Ok(mode) => {
            c.filter(mode).await;
            Ok(warp::reply::with_status(
                warp::reply::json(&c.snapshot().await),
                StatusCode::OK,
            ))
        }
        Err(e) => Ok(bad_request(&e)),
    }
}

async fn switch_tab(
    tab: String,
    c: Arc<Controller>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Rejection> {
    match tab.parse::<Tab>() {
        Ok(tab) => {
            c.switch_tab(tab).await;
            Ok(warp::reply::with_status(
                warp::reply::json(&c.snapshot().await),
                StatusCode::OK,
            ))
        }
        Err(e) => Ok(bad_request(&e)),
    }
}
