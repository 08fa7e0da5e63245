pub mod doctor;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use snitch_fc::pilot::SharedPilot;
use snitch_fc::safety::ClientCount;
use snitch_fc::state::FcStatus;
use snitch_proto::command::OperatorCommand;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// Operator surface listen address, e.g. "0.0.0.0:5760".
    pub listen: String,

    /// A session that sends nothing (not even an empty keepalive line), or
    /// stops taking replies, for this long is dropped and stops counting as a
    /// connected operator. Default 2000. Cannot be disabled.
    pub session_timeout_ms: Option<u64>,
}

impl LinkConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms.unwrap_or(DEFAULT_SESSION_TIMEOUT_MS))
    }
}

/// Everything a session needs to act on the vehicle.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub pilot: SharedPilot,
    pub clients: ClientCount,
    pub fc_status: Arc<Mutex<FcStatus>>,
}

impl Vehicle {
    /// Reply to one command line. `None` for keepalives.
    pub fn respond(&self, line: &str) -> Option<String> {
        if line.trim().is_empty() {
            return None;
        }
        let reply = match line.parse::<OperatorCommand>() {
            Ok(OperatorCommand::Status) => {
                let fc = self
                    .fc_status
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .health();
                let report = self.pilot.report(self.clients.get(), fc);
                serde_json::to_string(&report).unwrap_or_else(|e| format!("err {}", e))
            }
            Ok(cmd) => {
                self.pilot.apply_command(cmd);
                "ok".to_string()
            }
            Err(e) => format!("err {}", e),
        };
        Some(reply)
    }
}

/// Line-oriented TCP control surface.
///
/// Commands: `arm`, `disarm`, `throttle <1000-2000>`, `vision`, `status`.
/// They mutate flight state immediately and reach the flight controller on
/// the next emission tick. Open sessions are the control-link presence signal.
pub struct ControlServer {
    listener: TcpListener,
    vehicle: Vehicle,
    session_timeout: Duration,
}

impl ControlServer {
    pub async fn bind(cfg: &LinkConfig, vehicle: Vehicle) -> Result<Self> {
        let listener = TcpListener::bind(&cfg.listen)
            .await
            .with_context(|| format!("bind operator surface {}", cfg.listen))?;
        Ok(Self { listener, vehicle, session_timeout: cfg.session_timeout() })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn serve(self) -> Result<()> {
        info!("link: operator surface on {}", self.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await.context("accept operator")?;
            let vehicle = self.vehicle.clone();
            let timeout = self.session_timeout;
            tokio::spawn(async move {
                if let Err(e) = session(stream, peer, vehicle, timeout).await {
                    warn!("link: session {} ended: {:#}", peer, e);
                }
            });
        }
    }
}

async fn session(stream: TcpStream, peer: SocketAddr, vehicle: Vehicle, timeout: Duration) -> Result<()> {
    let _present = vehicle.clients.enter();
    info!("link: operator {} connected ({} open)", peer, vehicle.clients.get());

    let (r, mut w) = stream.into_split();
    let mut lines = BufReader::new(r).lines();
    loop {
        // Read and reply share one deadline: a client that stops reading is as
        // gone as one that stops writing.
        let exchange = async {
            let Some(line) = lines.next_line().await.context("read operator line")? else {
                return anyhow::Ok(false);
            };
            debug!("link: {} -> {:?}", peer, line);
            if let Some(reply) = vehicle.respond(&line) {
                w.write_all(reply.as_bytes()).await?;
                w.write_all(b"\n").await?;
            }
            anyhow::Ok(true)
        };
        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => break,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!("link: operator {} stalled for {:?}, dropping", peer, timeout);
                break;
            }
        }
    }

    info!("link: operator {} disconnected", peer);
    Ok(())
}
