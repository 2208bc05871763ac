#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use ::axum::Server;
use dotenvy::dotenv;
use std::{env, net::SocketAddr};
use tracing::info;

use crate::{axum::app, utils::logger};

mod axum;
mod http;
mod utils;

#[tokio::main]
async fn main() {
    dotenv().ok();
    let _guard = logger::setup();

    let app = app::create().expect("Failed to initialize the bot");
    let address = SocketAddr::from((
        [0, 0, 0, 0],
        env::var("PORT").map_or(8080, |p| p.parse().expect("$PORT must be a number")),
    ));

    info!("🤖 QA bot started on http://{address}");
    Server::bind(&address)
        .serve(app.into_make_service())
        .await
        .expect("Failed to start server");
}
