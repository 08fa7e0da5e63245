use anyhow::Result;
use std::net::SocketAddr;

use crate::LinkConfig;

pub fn check_link(cfg: &LinkConfig) -> Result<()> {
    anyhow::ensure!(
        cfg.listen.parse::<SocketAddr>().is_ok(),
        "link.listen is not ip:port: {}", cfg.listen
    );
    if let Some(ms) = cfg.session_timeout_ms {
        anyhow::ensure!(ms >= 100, "link.session_timeout_ms should be >= 100 (presence detection cannot be disabled)");
    }
    Ok(())
}
