//! Scrape endpoint: `/metrics` plus a landing page naming the volume.
//!
//! Requests are answered on a dedicated thread; rendering only reads the
//! recorder handle, so it never waits on an admin command.

use std::{error::Error, io, net::SocketAddr, thread};

use log::Level;
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tiny_http::{Header, Response, Server};

use crate::agent_log;
use crate::device::VolumeIdentity;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },

    #[error("cannot start HTTP thread: {0}")]
    Spawn(#[from] io::Error),
}

/// A rendered reply, kept apart from the socket so routing is testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

pub fn landing_page(identity: &VolumeIdentity) -> String {
    format!(
        "<html>\n<head><title>EBS Metrics Exporter</title></head>\n<body>\n\
         <h1>EBS Metrics Exporter</h1>\n<p><a href=\"/metrics\">Metrics</a></p>\n\
         <p>Device: {}</p>\n<p>Volume ID: {}</p>\n</body>\n</html>\n",
        identity.device_path.display(),
        identity.volume_id
    )
}

/// `/metrics` renders the exposition text; every other path gets the
/// landing page.
pub fn route(url: &str, identity: &VolumeIdentity, metrics: &PrometheusHandle) -> Reply {
    let path = url.split_once('?').map_or(url, |(p, _)| p);
    match path {
        "/metrics" => Reply {
            status: 200,
            content_type: "text/plain; version=0.0.4",
            body: metrics.render(),
        },
        _ => Reply { status: 200, content_type: "text/html", body: landing_page(identity) },
    }
}

pub struct MetricsServer {
    server: Server,
}

impl MetricsServer {
    pub fn bind(addr: SocketAddr) -> Result<Self, HttpError> {
        let server = Server::http(addr).map_err(|source| HttpError::Bind { addr, source })?;
        Ok(Self { server })
    }

    /// Bound address; differs from the requested one when port 0 was asked for.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serve until the process exits.
    pub fn spawn(
        self,
        identity: VolumeIdentity,
        metrics: PrometheusHandle,
    ) -> Result<thread::JoinHandle<()>, HttpError> {
        let handle = thread::Builder::new().name("metrics-http".into()).spawn(move || {
            for req in self.server.incoming_requests() {
                let reply = route(req.url(), &identity, &metrics);
                let mut response =
                    Response::from_string(reply.body).with_status_code(reply.status);
                if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type) {
                    response = response.with_header(header);
                }
                if let Err(e) = req.respond(response) {
                    agent_log!(Level::Debug, "http", "client went away: {}", e);
                }
            }
        })?;
        Ok(handle)
    }
}
