use actix::Addr;
use actix_web::{error, web, HttpResponse, Responder};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::PositionError;
use crate::game::chess::Position;
use crate::game::{checkers, connect_four, perft, raumschach, DrawReason, Rules};
use crate::models::RoomSummary;
use crate::websocket::{ws_index, GameServer, ListRooms};

pub const MAX_PERFT_DEPTH: u32 = 5;

/// HTTP handler for the index page
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Board game server: /ws/chess /ws/checkers /ws/c4 /ws/raum")
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "ts": chrono::Utc::now().timestamp_millis(),
    }))
}

async fn summaries<R: Rules>(server: &Addr<GameServer<R>>) -> Result<Vec<RoomSummary>, actix_web::Error> {
    server.send(ListRooms).await.map_err(error::ErrorInternalServerError)
}

pub async fn rooms(
    path: web::Path<String>,
    chess: web::Data<Addr<GameServer<Position>>>,
    checkers: web::Data<Addr<GameServer<checkers::Board>>>,
    connect_four: web::Data<Addr<GameServer<connect_four::Board>>>,
    raumschach: web::Data<Addr<GameServer<raumschach::Board>>>,
) -> Result<HttpResponse, actix_web::Error> {
    let rooms = match path.as_str() {
        "chess" => summaries(&chess).await?,
        "checkers" => summaries(&checkers).await?,
        "c4" => summaries(&connect_four).await?,
        "raum" => summaries(&raumschach).await?,
        other => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "error": format!("unknown game '{}'", other),
            })))
        }
    };
    Ok(HttpResponse::Ok().json(rooms))
}

#[derive(Debug, Default, Deserialize)]
pub struct PerftRequest {
    pub fen: Option<String>,
    pub depth: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerftResponse {
    pub fen: String,
    pub depth: u32,
    pub nodes: u64,
}

fn position_for(fen: Option<&str>) -> Result<Position, PositionError> {
    match fen.map(str::trim).filter(|f| !f.is_empty()) {
        Some(fen) => {
            let position = Position::from_fen(fen)?;
            position.check_kings()?;
            Ok(position)
        }
        None => Ok(Position::new()),
    }
}

fn bad_position(e: PositionError) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() }))
}

/// Move-tree node count from a FEN, or from the initial position.
pub async fn perft_handler(body: web::Json<PerftRequest>) -> Result<HttpResponse, actix_web::Error> {
    let PerftRequest { fen, depth } = body.into_inner();
    let depth = depth.unwrap_or(3).min(MAX_PERFT_DEPTH);
    let mut position = match position_for(fen.as_deref()) {
        Ok(position) => position,
        Err(e) => return Ok(bad_position(e)),
    };
    let fen = position.to_fen();
    let nodes = web::block(move || perft(&mut position, depth)).await?;
    info!("perft({}) = {} for {}", depth, nodes, fen);
    Ok(HttpResponse::Ok().json(PerftResponse { fen, depth, nodes }))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {
    pub fen: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub fen: String,
    pub in_check: bool,
    pub checkmate: bool,
    pub stalemate: bool,
    pub draw: Option<DrawReason>,
}

pub async fn status_handler(body: web::Json<StatusRequest>) -> HttpResponse {
    let mut position = match position_for(body.fen.as_deref()) {
        Ok(position) => position,
        Err(e) => return bad_position(e),
    };
    HttpResponse::Ok().json(StatusResponse {
        fen: position.to_fen(),
        in_check: position.is_check(),
        checkmate: position.is_checkmate(),
        stalemate: position.is_stalemate(),
        draw: position.detect_draw(),
    })
}

/// Configure the HTTP routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(index)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/rooms/{game}").route(web::get().to(rooms)))
        .service(web::resource("/perft").route(web::post().to(perft_handler)))
        .service(web::resource("/status").route(web::post().to(status_handler)))
        .service(web::resource("/ws/chess").route(web::get().to(ws_index::<Position>)))
        .service(web::resource("/ws/checkers").route(web::get().to(ws_index::<checkers::Board>)))
        .service(web::resource("/ws/c4").route(web::get().to(ws_index::<connect_four::Board>)))
        .service(web::resource("/ws/raum").route(web::get().to(ws_index::<raumschach::Board>)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_rt::test]
    async fn health_reports_ok() {
        let app = test::init_service(App::new().route("/health", web::get().to(health))).await;
        let resp: serde_json::Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp["ok"], true);
        assert!(resp["ts"].as_i64().unwrap() > 0);
    }

    #[actix_rt::test]
    async fn perft_clamps_depth() {
        let app = test::init_service(App::new().route("/perft", web::post().to(perft_handler))).await;
        let req = test::TestRequest::post()
            .uri("/perft")
            .set_json(serde_json::json!({ "depth": 2 }))
            .to_request();
        let resp: PerftResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.nodes, 400);

        let req = test::TestRequest::post()
            .uri("/perft")
            .set_json(serde_json::json!({ "fen": "8/8/8/8/8/8/8/K6k w - - 0 1", "depth": 99 }))
            .to_request();
        let resp: PerftResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.depth, MAX_PERFT_DEPTH);
    }

    #[actix_rt::test]
    async fn status_of_fools_mate() {
        let app = test::init_service(App::new().route("/status", web::post().to(status_handler))).await;
        let req = test::TestRequest::post()
            .uri("/status")
            .set_json(serde_json::json!({
                "fen": "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3"
            }))
            .to_request();
        let resp: StatusResponse = test::call_and_read_body_json(&app, req).await;
        assert!(resp.in_check);
        assert!(resp.checkmate);
        assert!(!resp.stalemate);
        assert_eq!(resp.draw, None);
    }

    #[actix_rt::test]
    async fn bad_fen_is_a_bad_request() {
        let app = test::init_service(App::new().route("/status", web::post().to(status_handler))).await;
        let req = test::TestRequest::post()
            .uri("/status")
            .set_json(serde_json::json!({ "fen": "not a fen" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn kingless_or_bad_en_passant_fen_is_a_bad_request() {
        let app = test::init_service(
            App::new()
                .route("/status", web::post().to(status_handler))
                .route("/perft", web::post().to(perft_handler)),
        )
        .await;
        for (uri, fen) in [
            ("/status", "8/8/8/8/8/8/8/4K3 w - - 0 1"),
            ("/perft", "8/8/8/8/8/8/8/4K3 w - - 0 1"),
            ("/status", "4k3/8/8/8/8/8/8/4K3 w - e6 0 1"),
        ] {
            let req = test::TestRequest::post()
                .uri(uri)
                .set_json(serde_json::json!({ "fen": fen, "depth": 1 }))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST, "{} {}", uri, fen);
        }
    }
}
