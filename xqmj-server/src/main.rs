use crate::{config::ServerConfig, directory_actor::DirectoryActor, session::*};
use futures::prelude::*;
use std::sync::Arc;
use thespian::*;
use tracing::*;
use tracing_futures::Instrument;
use warp::Filter;

mod config;
mod directory_actor;
mod session;

#[tokio::main]
async fn main() {
    let config = ServerConfig::from_env().expect("invalid server configuration");

    let _file_guard = setup_logging(&config);
    info!(?config, "starting xqmj-server");

    let stage = DirectoryActor::new().into_stage();
    let mut directory = stage.proxy();
    tokio::spawn(stage.run());
    directory
        .set_self(directory.clone())
        .await
        .expect("directory actor unreachable immediately after spawn");

    let session_id_generator = Arc::new(SessionIdGenerator::new());

    let client = warp::path("client")
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let directory = directory.clone();
            let id = session_id_generator.next();
            ws.on_upgrade(move |socket| {
                async move {
                    let (mut session, mut stream) =
                        match ClientSession::perform_handshake(id, socket, directory.clone()).await {
                            Ok(result) => result,
                            Err(err) => {
                                warn!(%err, "failed to establish session");
                                return;
                            }
                        };

                    while let Some(message) = stream.next().await {
                        match message {
                            Ok(message) => {
                                if message.is_close() {
                                    info!("socket closed, tearing down session");
                                    break;
                                }

                                match session.handle_message(message).await {
                                    Ok(Ok(())) => {}
                                    Ok(Err(err)) => error!(%err, "error handling client message"),
                                    Err(err) => {
                                        error!(%err, "session actor unreachable, ending session");
                                        break;
                                    }
                                }
                            }
                            Err(err) => {
                                error!(%err, "error reading from socket");
                                break;
                            }
                        }
                    }

                    let mut directory = directory.clone();
                    let _ = directory.unregister(id.0).await;
                }
                .instrument(trace_span!("client session", %id))
            })
        });

    let index = warp::path::end().map(|| warp::reply::html(INDEX_HTML));
    let routes = index.or(client);

    info!(port = config.port, "listening");
    warp::serve(routes).run(([0, 0, 0, 0], config.port)).await;
}

/// Installs the global `tracing` subscriber: human-readable stdout plus,
/// when a log directory is configured, a rolling daily file via
/// `tracing-appender`. Returns the non-blocking writer guard, which must
/// stay alive for the process lifetime or buffered log lines are dropped.
fn setup_logging(config: &ServerConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.to_string()));

    match &config.log_directory {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "xqmj-server.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .finish();
            tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
            Some(guard)
        }
        None => {
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_env_filter(filter)
                .finish();
            tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
            None
        }
    }
}

static INDEX_HTML: &str = r#"
<!DOCTYPE html>
<html>
    <head>
        <title>Xiangqi-Mahjong</title>
    </head>
    <body>
        <h1>xqmj-server</h1>
        <p>Connect a client to <code>/client</code> to play.</p>
    </body>
</html>
"#;
