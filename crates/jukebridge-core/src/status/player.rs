use std::collections::HashMap;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout, timeout_at};
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use super::codec::{PlayerCodec, PlayerCommand, PlayerLine};
use crate::config::PlayerConfig;
use crate::{Error, Result};

/// Key/value view of one `status` + `currentsong` response.
///
/// Keys are case-sensitive. When a key appears more than once the first
/// occurrence wins, so `status` fields shadow `currentsong` fields of the
/// same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStatus {
    fields: HashMap<String, String>,
}

impl PlayerStatus {
    #[must_use]
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = PlayerLine>,
    {
        let mut fields = HashMap::new();
        for line in lines {
            match line {
                PlayerLine::Field { key, value } => {
                    fields.entry(key).or_insert(value);
                }
                PlayerLine::Ack(error) => debug!("Player rejected a query: {}", error),
                PlayerLine::Greeting(_) | PlayerLine::Ok | PlayerLine::Other(_) => {}
            }
        }
        Self { fields }
    }

    /// Parse a complete response text.
    #[must_use]
    pub fn parse(response: &str) -> Self {
        Self::from_lines(response.lines().map(PlayerLine::parse))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Query the player for its status and current song.
///
/// Connecting and reading are each bounded by the configured timeout. A
/// response cut short by the read timeout is kept as far as it got.
///
/// # Errors
///
/// Returns `Error::PlayerUnreachable` if the connection cannot be made, the
/// request cannot be written, or no line arrives before the timeout.
pub async fn query_player(config: &PlayerConfig) -> Result<PlayerStatus> {
    let limit = config.timeout();
    let endpoint = format!("{}:{}", config.host, config.port);

    let stream = timeout(limit, TcpStream::connect((config.host.as_str(), config.port)))
        .await
        .map_err(|_| Error::PlayerUnreachable(format!("connect to {endpoint} timed out")))?
        .map_err(|e| Error::PlayerUnreachable(format!("connect to {endpoint}: {e}")))?;

    let mut framed = Framed::new(stream, PlayerCodec::new());
    for command in [
        PlayerCommand::Status,
        PlayerCommand::CurrentSong,
        PlayerCommand::Close,
    ] {
        framed
            .feed(command)
            .await
            .map_err(|e| Error::PlayerUnreachable(format!("write to {endpoint}: {e}")))?;
    }
    framed
        .flush()
        .await
        .map_err(|e| Error::PlayerUnreachable(format!("write to {endpoint}: {e}")))?;

    let deadline = Instant::now() + limit;
    let mut lines = Vec::new();
    loop {
        match timeout_at(deadline, framed.next()).await {
            Ok(Some(Ok(line))) => {
                trace!("player: {:?}", line);
                lines.push(line);
            }
            Ok(Some(Err(e))) => {
                warn!("Player response from {} unreadable: {}", endpoint, e);
                break;
            }
            Ok(None) => break,
            Err(_) => {
                debug!(
                    "Player response from {} timed out after {} lines",
                    endpoint,
                    lines.len()
                );
                break;
            }
        }
    }

    if lines.is_empty() {
        return Err(Error::PlayerUnreachable(format!(
            "no response from {endpoint}"
        )));
    }

    Ok(PlayerStatus::from_lines(lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_first_occurrence_wins() {
        let status = PlayerStatus::parse("OK MPD 0.23.5\nduration: 10.5\nOK\nduration: 99\nOK\n");
        assert_eq!(status.get("duration"), Some("10.5"));
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let status = PlayerStatus::parse("Artist: Someone\n");
        assert_eq!(status.get("Artist"), Some("Someone"));
        assert_eq!(status.get("artist"), None);
    }

    #[test]
    fn test_ack_lines_are_ignored() {
        let status = PlayerStatus::parse("ACK [5@0] {} unknown command\nstate: play\n");
        assert_eq!(status.get("state"), Some("play"));
        assert_eq!(status.get("ACK [5@0] {} unknown command"), None);
    }

    async fn serve_once(response: &'static [u8]) -> PlayerConfig {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 64];
            while !request.ends_with(b"close\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            assert_eq!(request, b"status\ncurrentsong\nclose\n");
            socket.write_all(response).await.unwrap();
        });

        PlayerConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 1000,
        }
    }

    #[tokio::test]
    async fn test_query_player_reads_full_response() {
        let config =
            serve_once(b"OK MPD 0.23.5\nvolume: 40\nstate: play\nOK\nfile: a.mp3\nOK\n").await;

        let status = query_player(&config).await.unwrap();
        assert_eq!(status.get("volume"), Some("40"));
        assert_eq!(status.get("state"), Some("play"));
        assert_eq!(status.get("file"), Some("a.mp3"));
    }

    #[tokio::test]
    async fn test_query_player_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = PlayerConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 200,
        };

        let err = query_player(&config).await.unwrap_err();
        assert!(matches!(err, Error::PlayerUnreachable(_)));
    }

    #[tokio::test]
    async fn test_query_player_silent_server_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        });

        let config = PlayerConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 100,
        };

        let err = query_player(&config).await.unwrap_err();
        assert!(matches!(err, Error::PlayerUnreachable(_)));
    }
}
