use actix::{Actor, Addr};
use actix_web::{middleware, web, App, HttpServer};
use log::info;

use board_game_server::config::Config;
use board_game_server::game::chess::Position;
use board_game_server::game::{checkers, connect_four, raumschach, Rules};
use board_game_server::persistence::SnapshotStore;
use board_game_server::routes;
use board_game_server::websocket::GameServer;

fn start_server<R: Rules>(config: &Config) -> Addr<GameServer<R>> {
    let store = SnapshotStore::in_dir(&config.save_dir, R::KIND);
    GameServer::<R>::new(config.lobby_settings(), store, config.queue_sweep_interval)
        .restored()
        .start()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env();
    info!("Starting board game server at http://{}:{}", config.host, config.port);
    info!("Saving rooms under {}", config.save_dir.display());

    let chess = web::Data::new(start_server::<Position>(&config));
    let checkers = web::Data::new(start_server::<checkers::Board>(&config));
    let connect_four = web::Data::new(start_server::<connect_four::Board>(&config));
    let raumschach = web::Data::new(start_server::<raumschach::Board>(&config));
    let bind = (config.host.clone(), config.port);
    let config = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(config.clone())
            .app_data(chess.clone())
            .app_data(checkers.clone())
            .app_data(connect_four.clone())
            .app_data(raumschach.clone())
            .configure(routes::configure_routes)
    })
    .bind(bind)?
    .run()
    .await
}
