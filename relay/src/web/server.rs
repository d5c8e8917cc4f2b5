//! Intake server lifecycle: bind, accept, shut down.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::web::handlers::{router, AppState};

/// Pause after a failed `accept()` before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be opened.
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The server was asked to stop.
    #[error("server was cancelled")]
    Cancelled,
}

/// A bound, not yet running, webhook intake server.
pub struct IntakeServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    header_read_timeout: Duration,
    app: Router,
}

impl IntakeServer {
    /// Open the listening socket on the configured address.
    pub async fn bind(
        config: Arc<ServerConfig>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, ServerError> {
        let addr = config.http_addr.clone();

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

        let header_read_timeout = config.header_read_timeout;
        let app = router(AppState::new(config, dispatcher));

        Ok(Self {
            listener,
            local_addr,
            header_read_timeout,
            app,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve webhooks until `shutdown` resolves.
    ///
    /// Each connection is served on its own task. On shutdown the listener
    /// is closed and [`ServerError::Cancelled`] is returned; connections
    /// already accepted are left to finish on their own.
    pub async fn run<F>(self, shutdown: F) -> Result<Infallible, ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            listener,
            local_addr,
            header_read_timeout,
            app,
        } = self;

        info!(address = %local_addr, "intake_server_listening");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, remote_addr)) => {
                            serve_connection(stream, remote_addr, app.clone(), header_read_timeout);
                        }
                        Err(e) => {
                            warn!(error = %e, "intake_server_accept_failed");
                            if shutdown_during_backoff(&mut shutdown).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        drop(listener);
        info!(address = %local_addr, "intake_server_closed");
        Err(ServerError::Cancelled)
    }
}

/// Wait out the accept-error backoff. Returns `true` if `shutdown` fired
/// first.
async fn shutdown_during_backoff<S>(shutdown: &mut S) -> bool
where
    S: Future<Output = ()> + Unpin,
{
    tokio::select! {
        _ = shutdown => true,
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => false,
    }
}

fn serve_connection(
    stream: tokio::net::TcpStream,
    remote_addr: SocketAddr,
    app: Router,
    header_read_timeout: Duration,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let service = TowerToHyperService::new(app);

        let result = http1::Builder::new()
            .timer(TokioTimer::new())
            .header_read_timeout(header_read_timeout)
            .serve_connection(io, service)
            .await;

        if let Err(e) = result {
            debug!(remote_addr = %remote_addr, error = %e, "intake_connection_error");
        }
    });
}
