//! NUT (Network UPS Tools) client over TCP.
//!
//! Speaks the line-oriented upsd protocol: one command per line, list
//! replies framed by `BEGIN LIST ...` / `END LIST ...`, failures reported as
//! `ERR <code>`.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::client::{NutError, NutFuture, UpsClient, UpsVars};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3493;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// upsd client holding at most one open connection.
///
/// The connection is opened on first use. While a request is in flight it
/// is taken out of the client and only put back once the reply has been read
/// in full, so an error or a dropped future leaves the client disconnected
/// and the next request dials again.
pub struct NutTcpClient {
    host: String,
    port: u16,
    connect_timeout: Duration,
    conn: Option<BufReader<TcpStream>>,
}

impl NutTcpClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            conn: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn connection(&mut self) -> Result<BufReader<TcpStream>, NutError> {
        if let Some(conn) = self.conn.take() {
            return Ok(conn);
        }
        let addr = self.addr();
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| NutError::Timeout)?
            .map_err(|e| NutError::Connect(format!("{addr}: {e}")))?;
        tracing::debug!(addr = %addr, "connected to upsd");
        Ok(BufReader::new(stream))
    }

    async fn list(&mut self, query: &str) -> Result<Vec<String>, NutError> {
        let mut conn = self.connection().await?;
        let body = request_list(&mut conn, query).await?;
        self.conn = Some(conn);
        Ok(body)
    }
}

impl Default for NutTcpClient {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl UpsClient for NutTcpClient {
    fn list_ups(&mut self) -> NutFuture<'_, Vec<String>> {
        Box::pin(async move {
            let body = self.list("UPS").await?;
            body.iter().map(|line| parse_ups_line(line)).collect()
        })
    }

    fn list_vars<'a>(&'a mut self, name: &'a str) -> NutFuture<'a, UpsVars> {
        Box::pin(async move {
            let body = self.list(&format!("VAR {name}")).await?;
            body.iter().map(|line| parse_var_line(line, name)).collect()
        })
    }
}

/// Send `LIST <query>` and return the lines between the BEGIN/END markers.
async fn request_list<S>(conn: &mut BufReader<S>, query: &str) -> Result<Vec<String>, NutError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    conn.get_mut()
        .write_all(format!("LIST {query}\n").as_bytes())
        .await
        .map_err(io_err)?;

    let first = read_line(conn).await?;
    if let Some(code) = first.strip_prefix("ERR") {
        return Err(NutError::Server(code.trim().to_owned()));
    }
    if first != format!("BEGIN LIST {query}") {
        return Err(NutError::Protocol(first));
    }

    let end = format!("END LIST {query}");
    let mut body = Vec::new();
    loop {
        let line = read_line(conn).await?;
        if line == end {
            return Ok(body);
        }
        body.push(line);
    }
}

async fn read_line<S>(conn: &mut BufReader<S>) -> Result<String, NutError>
where
    S: AsyncRead + Unpin,
{
    let mut line = String::new();
    let n = conn.read_line(&mut line).await.map_err(io_err)?;
    if n == 0 {
        return Err(NutError::Io("connection closed by upsd".into()));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn io_err(e: std::io::Error) -> NutError {
    NutError::Io(e.to_string())
}

/// `UPS <name> "<description>"`
fn parse_ups_line(line: &str) -> Result<String, NutError> {
    let mut words = split_words(line)?.into_iter();
    match (words.next().as_deref(), words.next()) {
        (Some("UPS"), Some(name)) => Ok(name),
        _ => Err(NutError::Protocol(line.to_owned())),
    }
}

/// `VAR <ups> <name> "<value>"`
fn parse_var_line(line: &str, ups: &str) -> Result<(String, String), NutError> {
    let words = split_words(line)?;
    match words.as_slice() {
        [kind, owner, name, value] if kind == "VAR" && owner == ups => {
            Ok((name.clone(), value.clone()))
        }
        _ => Err(NutError::Protocol(line.to_owned())),
    }
}

/// Split a reply line on spaces. Double-quoted words may contain spaces and
/// the escapes `\"` and `\\`.
fn split_words(line: &str) -> Result<Vec<String>, NutError> {
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut word = String::new();
        if c == '"' {
            chars.next();
            let mut closed = false;
            while let Some(ch) = chars.next() {
                match ch {
                    '\\' => match chars.next() {
                        Some(escaped) => word.push(escaped),
                        None => break,
                    },
                    '"' => {
                        closed = true;
                        break;
                    }
                    other => word.push(other),
                }
            }
            if !closed {
                return Err(NutError::Protocol(format!("unterminated quote: {line}")));
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                word.push(ch);
                chars.next();
            }
        }
        words.push(word);
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    #[test]
    fn split_plain_and_quoted_words() {
        let words = split_words(r#"VAR cp850 ups.model "CP 850 \"AVR\" \\ UPS""#).unwrap();
        assert_eq!(words, vec!["VAR", "cp850", "ups.model", r#"CP 850 "AVR" \ UPS"#]);
    }

    #[test]
    fn split_rejects_unterminated_quote() {
        assert!(matches!(split_words(r#"UPS cp850 "broken"#), Err(NutError::Protocol(_))));
    }

    #[test]
    fn split_keeps_empty_quoted_value() {
        let words = split_words(r#"VAR cp850 ups.serial """#).unwrap();
        assert_eq!(words, vec!["VAR", "cp850", "ups.serial", ""]);
    }

    #[test]
    fn parse_ups_and_var_lines() {
        assert_eq!(parse_ups_line(r#"UPS cp850 "Desk unit""#).unwrap(), "cp850");
        assert_eq!(
            parse_var_line(r#"VAR cp850 battery.charge "87""#, "cp850").unwrap(),
            ("battery.charge".to_string(), "87".to_string())
        );
        assert!(parse_var_line(r#"VAR other battery.charge "87""#, "cp850").is_err());
        assert!(parse_ups_line("RW cp850 x").is_err());
    }

    #[tokio::test]
    async fn request_list_reads_framed_body() {
        let (client, mut server) = tokio::io::duplex(1024);
        server
            .write_all(b"BEGIN LIST UPS\r\nUPS a \"A\"\r\nUPS b \"B\"\r\nEND LIST UPS\r\n")
            .await
            .unwrap();
        let mut conn = BufReader::new(client);
        let body = request_list(&mut conn, "UPS").await.unwrap();
        assert_eq!(body, vec![r#"UPS a "A""#, r#"UPS b "B""#]);
    }

    #[tokio::test]
    async fn request_list_maps_err_reply() {
        let (client, mut server) = tokio::io::duplex(1024);
        server.write_all(b"ERR UNKNOWN-UPS\n").await.unwrap();
        let mut conn = BufReader::new(client);
        let err = request_list(&mut conn, "VAR ghost").await.unwrap_err();
        assert_eq!(err, NutError::Server("UNKNOWN-UPS".into()));
    }

    #[tokio::test]
    async fn request_list_rejects_mismatched_header() {
        let (client, mut server) = tokio::io::duplex(1024);
        server.write_all(b"BEGIN LIST VAR other\n").await.unwrap();
        let mut conn = BufReader::new(client);
        let err = request_list(&mut conn, "VAR cp850").await.unwrap_err();
        assert!(matches!(err, NutError::Protocol(_)));
    }

    /// Minimal upsd: answers `LIST UPS` and `LIST VAR cp850`, `ERR` for anything else.
    async fn spawn_fake_upsd() -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut conn = BufReader::new(stream);
                    loop {
                        let mut line = String::new();
                        match conn.read_line(&mut line).await {
                            Ok(0) | Err(_) => return,
                            Ok(_) => {}
                        }
                        let reply = match line.trim_end() {
                            "LIST UPS" => {
                                "BEGIN LIST UPS\nUPS cp850 \"Desk unit\"\nUPS rack \"Rack unit\"\nEND LIST UPS\n"
                            }
                            "LIST VAR cp850" => concat!(
                                "BEGIN LIST VAR cp850\n",
                                "VAR cp850 battery.charge \"87\"\n",
                                "VAR cp850 battery.runtime \"1520\"\n",
                                "VAR cp850 ups.status \"OL CHRG\"\n",
                                "END LIST VAR cp850\n"
                            ),
                            _ => "ERR UNKNOWN-UPS\n",
                        };
                        if conn.get_mut().write_all(reply.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });
        (port, connections)
    }

    #[tokio::test]
    async fn lists_units_and_vars_over_one_connection() {
        let (port, connections) = spawn_fake_upsd().await;
        let mut client = NutTcpClient::new("127.0.0.1", port);

        let units = client.list_ups().await.unwrap();
        assert_eq!(units, vec!["cp850".to_string(), "rack".to_string()]);

        let vars = client.list_vars("cp850").await.unwrap();
        assert_eq!(vars["battery.charge"], "87");
        assert_eq!(vars["battery.runtime"], "1520");
        assert_eq!(vars["ups.status"], "OL CHRG");

        assert!(client.is_connected());
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_reply_forces_reconnect() {
        let (port, connections) = spawn_fake_upsd().await;
        let mut client = NutTcpClient::new("127.0.0.1", port);

        let err = client.list_vars("ghost").await.unwrap_err();
        assert_eq!(err, NutError::Server("UNKNOWN-UPS".into()));
        assert!(!client.is_connected());

        client.list_ups().await.unwrap();
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = NutTcpClient::new("127.0.0.1", port);
        let err = client.list_ups().await.unwrap_err();
        assert!(matches!(err, NutError::Connect(_)), "got {err:?}");
    }

    #[test]
    fn default_targets_local_upsd() {
        assert_eq!(NutTcpClient::default().addr(), "127.0.0.1:3493");
    }
}
