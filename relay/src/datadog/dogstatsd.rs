//! DogStatsD event sender.
//!
//! Events are written as single UDP datagrams in the DogStatsD event format:
//!
//! ```text
//! _e{<title length>,<text length>}:<title>|<text>|d:<timestamp>|#<tag>,<tag>
//! ```
//!
//! Reference: https://docs.datadoghq.com/developers/dogstatsd/datagram_shell/?tab=events

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use anyhow::{Context, Result};
use tokio::net::{lookup_host, UdpSocket};
use tracing::info;

use super::Event;
use crate::dispatch::SenderError;

#[derive(Debug)]
pub struct DogstatsdSender {
    socket: UdpSocket,
    addr: String,
}

impl DogstatsdSender {
    /// Create a sender bound to an ephemeral local port and connected to
    /// the agent at `addr`.
    pub async fn new(addr: &str) -> Result<Self> {
        let agent = lookup_host(addr)
            .await
            .with_context(|| format!("Failed to resolve DogStatsD address {:?}", addr))?
            .next()
            .with_context(|| format!("DogStatsD address {:?} resolved to nothing", addr))?;

        let socket = UdpSocket::bind(local_bind_addr(&agent))
            .await
            .context("Failed to bind DogStatsD socket")?;
        socket
            .connect(agent)
            .await
            .with_context(|| format!("Failed to connect to DogStatsD agent at {}", agent))?;

        Ok(Self {
            socket,
            addr: addr.to_string(),
        })
    }

    pub async fn send_event(&self, event: &Event) -> std::result::Result<(), SenderError> {
        let datagram = format_event(event);

        self.socket
            .send(datagram.as_bytes())
            .await
            .map_err(|source| SenderError::Datagram {
                addr: self.addr.clone(),
                source,
            })?;

        info!(
            addr = %self.addr,
            datagram_length = datagram.len(),
            "dogstatsd_event_sent"
        );

        Ok(())
    }
}

/// Wildcard address of the same family as `agent`, on an ephemeral port.
fn local_bind_addr(agent: &SocketAddr) -> SocketAddr {
    match agent {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

/// Render an event as a DogStatsD datagram.
pub fn format_event(event: &Event) -> String {
    let title = escape(&event.title);
    let text = escape(&event.text);

    let mut datagram = format!("_e{{{},{}}}:{}|{}", title.len(), text.len(), title, text);

    if let Some(timestamp) = event.timestamp {
        datagram.push_str(&format!("|d:{}", timestamp.timestamp()));
    }

    if !event.tags.is_empty() {
        datagram.push_str("|#");
        datagram.push_str(&event.tags.join(","));
    }

    datagram
}

fn escape(value: &str) -> String {
    value.replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_event_minimal() {
        let event = Event::new("Webhook event", "hello");
        assert_eq!(format_event(&event), "_e{13,5}:Webhook event|hello");
    }

    #[test]
    fn test_format_event_full() {
        let mut event = Event::new("Webhook event", "line one\nline two");
        event.add_tag("webhook_event_type", "task");
        event.add_tag("task_id", 7);
        event.timestamp = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        assert_eq!(
            format_event(&event),
            "_e{13,18}:Webhook event|line one\\nline two|d:1704067200|#webhook_event_type:task,task_id:7"
        );
    }

    #[tokio::test]
    async fn test_send_event_over_udp() {
        let agent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let agent_addr = agent.local_addr().unwrap();

        let sender = DogstatsdSender::new(&agent_addr.to_string()).await.unwrap();

        let mut event = Event::new("Webhook event", "{}");
        event.add_tag("build_id", 1);
        sender.send_event(&event).await.unwrap();

        let mut buf = [0u8; 1024];
        let len = agent.recv(&mut buf).await.unwrap();
        assert_eq!(
            std::str::from_utf8(&buf[..len]).unwrap(),
            "_e{13,2}:Webhook event|{}|#build_id:1"
        );
    }

    #[test]
    fn test_local_bind_addr_matches_family() {
        let v4: SocketAddr = "127.0.0.1:8125".parse().unwrap();
        let v6: SocketAddr = "[::1]:8125".parse().unwrap();

        assert_eq!(local_bind_addr(&v4), "0.0.0.0:0".parse::<SocketAddr>().unwrap());
        assert_eq!(local_bind_addr(&v6), "[::]:0".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_new_rejects_unresolvable_address() {
        assert!(DogstatsdSender::new("not an address").await.is_err());
        assert!(DogstatsdSender::new("127.0.0.1").await.is_err());
    }
}
