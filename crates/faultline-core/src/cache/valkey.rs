//! Valkey/Redis-compatible network cache provider.
//!
//! Speaks the line-oriented request/response protocol (length-prefixed
//! arrays of bulk strings) over TCP, optionally TLS. Connections are
//! per-call and never pooled; transient network failures are retried with
//! exponential backoff starting at 25 ms.

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::{CacheError, CacheProvider};

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(500);
const BACKOFF_BASE: Duration = Duration::from_millis(25);

/// Connection parameters for the Valkey server.
#[derive(Debug, Clone)]
pub struct ValkeyConfig {
    /// `host:port` of the server.
    pub addr: String,
    pub username: String,
    pub password: String,
    /// Database selected after connect when greater than zero.
    pub db: u32,
    pub tls: bool,
    pub dial_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Total connection attempts per operation, minimum 1.
    pub max_retries: u32,
}

impl Default for ValkeyConfig {
    fn default() -> Self {
        Self {
            addr: String::new(),
            username: String::new(),
            password: String::new(),
            db: 0,
            tls: false,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            read_timeout: DEFAULT_IO_TIMEOUT,
            write_timeout: DEFAULT_IO_TIMEOUT,
            max_retries: 1,
        }
    }
}

impl ValkeyConfig {
    fn normalized(mut self) -> Self {
        if self.dial_timeout.is_zero() {
            self.dial_timeout = DEFAULT_DIAL_TIMEOUT;
        }
        if self.read_timeout.is_zero() {
            self.read_timeout = DEFAULT_IO_TIMEOUT;
        }
        if self.write_timeout.is_zero() {
            self.write_timeout = DEFAULT_IO_TIMEOUT;
        }
        if self.max_retries == 0 {
            self.max_retries = 1;
        }
        self
    }

    fn tls_server_name(&self) -> String {
        match self.addr.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.addr.clone(),
        }
    }
}

/// One decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Simple(String),
    Integer(i64),
    Bulk(Vec<u8>),
    Nil,
}

/// Cache provider backed by a Valkey-compatible server.
pub struct ValkeyCache {
    cfg: ValkeyConfig,
    tls: Option<TlsConnector>,
}

impl std::fmt::Debug for ValkeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyCache")
            .field("addr", &self.cfg.addr)
            .field("tls", &self.cfg.tls)
            .finish()
    }
}

impl ValkeyCache {
    /// Connects to the configured server and fails fast with a ping so that
    /// bad credentials or connectivity surface at startup.
    pub async fn connect(cfg: ValkeyConfig) -> Result<Self, CacheError> {
        if cfg.addr.is_empty() {
            return Err(CacheError::Protocol("valkey addr is required".into()));
        }
        let cfg = cfg.normalized();

        let tls = if cfg.tls {
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            let tls_config = rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth();
            Some(TlsConnector::from(Arc::new(tls_config)))
        } else {
            None
        };

        let provider = Self { cfg, tls };
        provider.ping().await?;
        Ok(provider)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        match self.request(encode_command(&[b"PING"])).await? {
            Reply::Simple(s) if s == "PONG" => Ok(()),
            other => Err(CacheError::Protocol(format!(
                "unexpected PING reply: {other:?}"
            ))),
        }
    }

    /// Dials, authenticates, runs one command and closes the connection.
    /// Retries on transient network errors only.
    async fn request(&self, command: Vec<u8>) -> Result<Reply, CacheError> {
        let attempts = self.cfg.max_retries.max(1);
        let mut last_err = CacheError::Timeout;
        for attempt in 0..attempts {
            match self.request_once(&command).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    debug!(attempt, error = %err, "retrying cache request");
                    tokio::time::sleep(backoff(attempt)).await;
                    last_err = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err)
    }

    async fn request_once(&self, command: &[u8]) -> Result<Reply, CacheError> {
        let mut conn = self.dial().await?;
        self.bootstrap(&mut conn).await?;
        self.send(&mut conn, command).await?;
        self.read_reply(&mut conn).await
    }

    async fn dial(&self) -> Result<Conn, CacheError> {
        let tcp = tokio::time::timeout(self.cfg.dial_timeout, TcpStream::connect(&self.cfg.addr))
            .await
            .map_err(|_| CacheError::Timeout)??;

        let stream: Box<dyn Stream> = match &self.tls {
            Some(connector) => {
                let name = ServerName::try_from(self.cfg.tls_server_name())
                    .map_err(|e| CacheError::Protocol(format!("invalid TLS server name: {e}")))?;
                let tls = tokio::time::timeout(self.cfg.dial_timeout, connector.connect(name, tcp))
                    .await
                    .map_err(|_| CacheError::Timeout)??;
                Box::new(tls)
            }
            None => Box::new(tcp),
        };

        Ok(BufReader::new(stream))
    }

    /// Optional AUTH and SELECT on the fresh connection.
    async fn bootstrap(&self, conn: &mut Conn) -> Result<(), CacheError> {
        if !self.cfg.password.is_empty() {
            let auth = if self.cfg.username.is_empty() {
                encode_command(&[b"AUTH", self.cfg.password.as_bytes()])
            } else {
                encode_command(&[
                    b"AUTH",
                    self.cfg.username.as_bytes(),
                    self.cfg.password.as_bytes(),
                ])
            };
            self.send(conn, &auth).await?;
            match self.read_reply(conn).await? {
                Reply::Simple(s) if s.eq_ignore_ascii_case("ok") => {}
                other => return Err(CacheError::Server(format!("auth failed: {other:?}"))),
            }
        }
        if self.cfg.db > 0 {
            let select = encode_command(&[b"SELECT", self.cfg.db.to_string().as_bytes()]);
            self.send(conn, &select).await?;
            match self.read_reply(conn).await? {
                Reply::Simple(s) if s.eq_ignore_ascii_case("ok") => {}
                other => return Err(CacheError::Server(format!("select failed: {other:?}"))),
            }
        }
        Ok(())
    }

    async fn send(&self, conn: &mut Conn, command: &[u8]) -> Result<(), CacheError> {
        tokio::time::timeout(self.cfg.write_timeout, async {
            conn.get_mut().write_all(command).await?;
            conn.get_mut().flush().await
        })
        .await
        .map_err(|_| CacheError::Timeout)??;
        Ok(())
    }

    async fn read_reply(&self, conn: &mut Conn) -> Result<Reply, CacheError> {
        tokio::time::timeout(self.cfg.read_timeout, read_reply(conn))
            .await
            .map_err(|_| CacheError::Timeout)?
    }
}

#[async_trait]
impl CacheProvider for ValkeyCache {
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        match self
            .request(encode_command(&[b"GET", key.as_bytes()]))
            .await?
        {
            Reply::Nil => Err(CacheError::Miss),
            Reply::Bulk(data) => Ok(data),
            other => Err(CacheError::Protocol(format!(
                "unexpected GET reply: {other:?}"
            ))),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let ttl_ms;
        let mut parts: Vec<&[u8]> = vec![b"SET", key.as_bytes(), value];
        if !ttl.is_zero() {
            ttl_ms = ttl.as_millis().to_string();
            parts.push(b"PX");
            parts.push(ttl_ms.as_bytes());
        }
        match self.request(encode_command(&parts)).await? {
            Reply::Simple(s) if s == "OK" => Ok(()),
            other => Err(CacheError::Protocol(format!(
                "unexpected SET reply: {other:?}"
            ))),
        }
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, CacheError> {
        let ttl_ms;
        let mut parts: Vec<&[u8]> = vec![b"SET", key.as_bytes(), value];
        if !ttl.is_zero() {
            ttl_ms = ttl.as_millis().to_string();
            parts.push(b"PX");
            parts.push(ttl_ms.as_bytes());
        }
        parts.push(b"NX");
        match self.request(encode_command(&parts)).await? {
            Reply::Simple(_) => Ok(true),
            Reply::Nil => Ok(false),
            other => Err(CacheError::Protocol(format!(
                "unexpected SET NX reply: {other:?}"
            ))),
        }
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.request(encode_command(&[b"DEL", key.as_bytes()]))
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        // Connections are per-call; nothing to release.
        Ok(())
    }
}

trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

type Conn = BufReader<Box<dyn Stream>>;

fn backoff(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.saturating_pow(attempt)
}

/// Encodes a command as a length-prefixed array of bulk strings.
fn encode_command(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + parts.iter().map(|p| p.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", parts.len()).as_bytes());
    for part in parts {
        out.extend_from_slice(format!("${}\r\n", part.len()).as_bytes());
        out.extend_from_slice(part);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Decodes one reply. Replies are tagged `+`, `-`, `:`, `$`, with `$-1`
/// representing nil.
async fn read_reply<R>(reader: &mut R) -> Result<Reply, CacheError>
where
    R: AsyncBufReadExt + Unpin + Send,
{
    let line = read_line(reader).await?;
    let (prefix, rest) = match line.split_first() {
        Some(split) => split,
        None => return Err(CacheError::Protocol("empty reply line".into())),
    };
    let rest = String::from_utf8_lossy(rest).into_owned();

    match prefix {
        b'+' => Ok(Reply::Simple(rest)),
        b'-' => Err(CacheError::Server(rest)),
        b':' => {
            let n = rest
                .parse::<i64>()
                .map_err(|e| CacheError::Protocol(format!("bad integer reply: {e}")))?;
            Ok(Reply::Integer(n))
        }
        b'$' => {
            let size = rest
                .parse::<i64>()
                .map_err(|e| CacheError::Protocol(format!("bad bulk length: {e}")))?;
            if size == -1 {
                return Ok(Reply::Nil);
            }
            let size = usize::try_from(size)
                .map_err(|_| CacheError::Protocol("negative bulk length".into()))?;
            let mut buf = vec![0u8; size + 2];
            reader.read_exact(&mut buf).await?;
            if &buf[size..] != b"\r\n" {
                return Err(CacheError::Protocol("invalid bulk termination".into()));
            }
            buf.truncate(size);
            Ok(Reply::Bulk(buf))
        }
        other => Err(CacheError::Protocol(format!(
            "unexpected reply prefix {:?}",
            char::from(*other)
        ))),
    }
}

async fn read_line<R>(reader: &mut R) -> Result<Vec<u8>, CacheError>
where
    R: AsyncBufReadExt + Unpin + Send,
{
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Err(CacheError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed",
        )));
    }
    while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
        line.pop();
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn decode(input: &[u8]) -> Result<Reply, CacheError> {
        let mut reader = BufReader::new(input);
        read_reply(&mut reader).await
    }

    #[test]
    fn commands_encode_as_bulk_string_arrays() {
        let encoded = encode_command(&[b"SET", b"k", b"v", b"PX", b"1500"]);
        assert_eq!(
            encoded,
            b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nPX\r\n$4\r\n1500\r\n"
        );
    }

    #[tokio::test]
    async fn decodes_simple_strings() {
        assert_eq!(decode(b"+OK\r\n").await.unwrap(), Reply::Simple("OK".into()));
    }

    #[tokio::test]
    async fn decodes_integers() {
        assert_eq!(decode(b":42\r\n").await.unwrap(), Reply::Integer(42));
    }

    #[tokio::test]
    async fn decodes_bulk_strings() {
        assert_eq!(
            decode(b"$5\r\nhello\r\n").await.unwrap(),
            Reply::Bulk(b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn nil_bulk_is_distinct() {
        assert_eq!(decode(b"$-1\r\n").await.unwrap(), Reply::Nil);
    }

    #[tokio::test]
    async fn error_replies_become_server_errors() {
        let err = decode(b"-WRONGTYPE not a string\r\n").await.unwrap_err();
        assert!(matches!(err, CacheError::Server(msg) if msg.contains("WRONGTYPE")));
    }

    #[tokio::test]
    async fn truncated_bulk_is_a_protocol_error() {
        let err = decode(b"$5\r\nhel\r\n").await.unwrap_err();
        assert!(!err.is_miss());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff(0), Duration::from_millis(25));
        assert_eq!(backoff(1), Duration::from_millis(50));
        assert_eq!(backoff(2), Duration::from_millis(100));
    }

    #[test]
    fn config_normalisation_fills_defaults() {
        let cfg = ValkeyConfig {
            addr: "cache:6379".into(),
            dial_timeout: Duration::ZERO,
            read_timeout: Duration::ZERO,
            write_timeout: Duration::ZERO,
            max_retries: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(cfg.dial_timeout, Duration::from_secs(2));
        assert_eq!(cfg.read_timeout, Duration::from_millis(500));
        assert_eq!(cfg.max_retries, 1);
    }

    #[test]
    fn tls_server_name_strips_port() {
        let cfg = ValkeyConfig {
            addr: "cache.internal:6380".into(),
            ..Default::default()
        };
        assert_eq!(cfg.tls_server_name(), "cache.internal");
    }
}
