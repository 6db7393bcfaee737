//! Liveness endpoint for hosting platforms that ping the process.
//!
//! Independent of the session controller: it answers while the process is up,
//! whatever state the bot is in.

use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Method, Response, Server};
use tracing::{debug, info};

pub const DEFAULT_PORT: u16 = 3000;

/// Body returned for `GET /`.
pub const RUNNING_BODY: &str = "Bot is running";

/// Environment variable that overrides the configured port.
pub const PORT_ENV: &str = "PORT";

/// Port from the environment if it parses, else the configured one.
#[must_use]
pub fn resolve_port(env: Option<&str>, configured: u16) -> u16 {
    env.and_then(|v| v.trim().parse().ok()).unwrap_or(configured)
}

pub struct LivenessServer {
    server: Arc<Server>,
    port: u16,
    worker: Option<JoinHandle<()>>,
}

impl LivenessServer {
    /// Bind on all interfaces and start answering on a background thread.
    /// Port 0 picks a free port.
    pub fn start(port: u16) -> Result<Self> {
        let server = Server::http(("0.0.0.0", port))
            .map_err(|e| anyhow!("Failed to bind liveness server on port {port}: {e}"))?;
        let port = server
            .server_addr()
            .to_ip()
            .map_or(port, |addr| addr.port());
        let server = Arc::new(server);

        let worker = {
            let server = server.clone();
            thread::Builder::new()
                .name("liveness".into())
                .spawn(move || serve(&server))?
        };

        info!("Server started on port {port}");
        Ok(Self {
            server,
            port,
            worker: Some(worker),
        })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for LivenessServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve(server: &Server) {
    for request in server.incoming_requests() {
        let response = if *request.method() == Method::Get && request.url() == "/" {
            Response::from_string(RUNNING_BODY)
        } else {
            Response::from_string("Not Found").with_status_code(404)
        };
        if let Err(e) = request.respond(response) {
            debug!("Liveness response failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    fn get(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        write!(
            stream,
            "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_resolve_port() {
        assert_eq!(resolve_port(None, 3000), 3000);
        assert_eq!(resolve_port(Some("8080"), 3000), 8080);
        assert_eq!(resolve_port(Some(" 9000 "), 3000), 9000);
        assert_eq!(resolve_port(Some("not-a-port"), 3000), 3000);
        assert_eq!(resolve_port(Some("70000"), 3000), 3000);
    }

    #[test]
    fn test_root_returns_running() {
        let server = LivenessServer::start(0).unwrap();
        let response = get(server.port(), "/");
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with(RUNNING_BODY));
        server.shutdown();
    }

    #[test]
    fn test_other_paths_not_found() {
        let server = LivenessServer::start(0).unwrap();
        let response = get(server.port(), "/status");
        assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    }
}
