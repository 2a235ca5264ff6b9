use std::net::SocketAddr;

use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use log::{debug, error, info};
use rt_gate::{spawn_server, spawn_worker, GateTask};
use socket2::{Domain, Socket, Type};
use tokio::io::{AsyncRead, AsyncWrite};

#[cfg(feature = "http1")]
use hyper::server::conn::http1;
#[cfg(feature = "http2")]
use hyper::server::conn::http2;
#[cfg(feature = "http2")]
use hyper_util::rt::TokioExecutor;

use crate::{
    app::App,
    config::Protocol,
    errors::GantryError,
    server::{Listener, ListenerResult, Transport},
};

type GantryTcpListener = tokio::net::TcpListener;

/// TCP listener serving one [`App`].
pub struct TcpListener {
    app: App,
    protocol: Protocol,
    transport: Transport,
    task: Option<GateTask>,
    local_addr: Option<SocketAddr>,
}

impl TcpListener {
    pub fn new(app: App, protocol: Protocol, transport: Transport) -> Self {
        Self { app, protocol, transport, task: None, local_addr: None }
    }

    /// Returns the app instance connections are served against.
    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn is_secure(&self) -> bool {
        self.transport
            .is_secure()
    }

    /// Returns the bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_listening(&self) -> bool {
        self.task
            .is_some()
    }
}

impl Listener for TcpListener {
    fn listen(&mut self, port: u16, hostname: &str, backlog: u32) -> ListenerResult<SocketAddr> {
        let hostname = if hostname.is_empty() { "0.0.0.0" } else { hostname }.to_string();

        let future = async move {
            let addr = resolve(&hostname, port).await?;
            let listener = bind(addr, backlog)?;
            let local_addr = listener
                .local_addr()
                .map_err(|e| GantryError::Bind(e.to_string()))?;

            let task = handle_connections(
                listener,
                self.protocol
                    .clone(),
                self.transport
                    .clone(),
                self.app
                    .clone(),
            );

            info!(
                "Listening on {}{}",
                local_addr,
                if self.is_secure() { " (tls)" } else { "" }
            );

            self.task = Some(task);
            self.local_addr = Some(local_addr);

            Ok(local_addr)
        };

        Box::pin(future)
    }

    fn stop(&mut self) -> ListenerResult<()> {
        let future = async move {
            match self
                .task
                .take()
            {
                Some(mut task) => {
                    task.cancel()
                        .await;
                    if let Some(addr) = self
                        .local_addr
                        .take()
                    {
                        info!("Stopped listening on {}", addr);
                    }
                    Ok(())
                }
                None => Err(GantryError::NoListener),
            }
        };

        Box::pin(future)
    }
}

async fn resolve(hostname: &str, port: u16) -> Result<SocketAddr, GantryError> {
    if let Ok(ip) = hostname.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::from((ip, port)));
    }

    tokio::net::lookup_host((hostname, port))
        .await
        .map_err(|e| GantryError::Bind(format!("{}: {}", hostname, e)))?
        .next()
        .ok_or_else(|| GantryError::Bind(format!("{}: no addresses found", hostname)))
}

fn bind(addr: SocketAddr, backlog: u32) -> Result<GantryTcpListener, GantryError> {
    let bind_error = |e: std::io::Error| GantryError::Bind(format!("{}: {}", addr, e));

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None).map_err(bind_error)?;
    socket
        .set_reuse_address(true)
        .map_err(bind_error)?;
    socket
        .set_nonblocking(true)
        .map_err(bind_error)?;
    socket
        .bind(&addr.into())
        .map_err(bind_error)?;
    socket
        .listen(backlog.min(i32::MAX as u32) as i32)
        .map_err(bind_error)?;

    GantryTcpListener::from_std(socket.into()).map_err(bind_error)
}

fn handle_connections(
    listener: GantryTcpListener,
    protocol: Protocol,
    transport: Transport,
    app: App,
) -> GateTask {
    let future = async move {
        loop {
            let (stream, peer) = match listener
                .accept()
                .await
            {
                Ok(accepted) => accepted,
                Err(err) => {
                    error!("Cannot accept connection: {:?}", err);
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                error!("Cannot set TCP_NODELAY: {}", e);
                continue;
            }

            debug!("Accepted connection from {}", peer);

            let protocol = protocol.clone();
            let app = app.clone();
            match &transport {
                Transport::Plain => {
                    spawn_worker(serve_connection(protocol, TokioIo::new(stream), app));
                }
                #[cfg(feature = "tokio-rust-tls")]
                Transport::Tls(acceptor) => {
                    let acceptor = acceptor.clone();
                    spawn_worker(async move {
                        match acceptor
                            .accept(stream)
                            .await
                        {
                            Ok(tls_stream) => {
                                serve_connection(protocol, TokioIo::new(tls_stream), app).await
                            }
                            Err(e) => error!("TLS handshake with {} failed: {}", peer, e),
                        }
                    });
                }
            }
        }
    };

    spawn_server(future)
}

async fn serve_connection<T>(protocol: Protocol, io: TokioIo<T>, app: App)
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |request| {
        app.clone()
            .serve(request)
    });

    match protocol {
        #[cfg(feature = "http1")]
        Protocol::Http1 => {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, service)
                .await
            {
                error!("Error serving connection: {:?}", err);
            }
        }
        #[cfg(feature = "http2")]
        Protocol::Http2 => {
            if let Err(err) = http2::Builder::new(TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                error!("Error serving connection: {:?}", err);
            }
        }
    }
}
