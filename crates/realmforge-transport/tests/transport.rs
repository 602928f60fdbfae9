//! Integration tests for the line and WebSocket transports.
//!
//! These spin up a real listener on an OS-assigned port and a real client
//! to verify that lines survive the trip byte for byte.

use realmforge_transport::{
    Connection, LineConnection, LineTransport, Transport, TransportError,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

// =========================================================================
// Line transport
// =========================================================================

#[tokio::test]
async fn test_line_accept_and_send_receive() {
    let mut transport = LineTransport::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = transport.local_addr().expect("should have address");

    let server_handle =
        tokio::spawn(async move { transport.accept().await.expect("should accept") });
    let client = LineConnection::connect(addr).await.expect("should connect");
    let server = server_handle.await.expect("task should complete");

    assert!(server.id().into_inner() > 0);
    assert_ne!(server.id(), client.id());

    // --- Server sends, client receives ---
    server.send("say 1 7 0 hello world").await.unwrap();
    let line = client.recv().await.unwrap().expect("should have a line");
    assert_eq!(line, "say 1 7 0 hello world");

    // --- Client sends, server receives ---
    client.send("walk 10 12 5").await.unwrap();
    let line = server.recv().await.unwrap().expect("should have a line");
    assert_eq!(line, "walk 10 12 5");
}

#[tokio::test]
async fn test_line_recv_strips_crlf_and_splits_batched_lines() {
    let mut transport = LineTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();
    let server_handle = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(addr).await.unwrap();
    let server = server_handle.await.unwrap();

    // Two lines arriving in a single segment, one with a CRLF terminator.
    raw.write_all(b"preq\r\nselect 4\n").await.unwrap();

    assert_eq!(server.recv().await.unwrap().as_deref(), Some("preq"));
    assert_eq!(server.recv().await.unwrap().as_deref(), Some("select 4"));
}

#[tokio::test]
async fn test_line_recv_drops_invalid_utf8_and_keeps_reading() {
    let mut transport = LineTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();
    let server_handle = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(addr).await.unwrap();
    let server = server_handle.await.unwrap();

    raw.write_all(b"walk \xff\xfe 3\nwalk 4 3\n").await.unwrap();

    assert_eq!(server.recv().await.unwrap().as_deref(), Some("walk 4 3"));
}

#[tokio::test]
async fn test_line_recv_resumes_after_cancel_mid_line() {
    let mut transport = LineTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();
    let server_handle = tokio::spawn(async move { transport.accept().await.unwrap() });

    let mut raw = TcpStream::connect(addr).await.unwrap();
    let server = server_handle.await.unwrap();

    raw.write_all(b"select ").await.unwrap();
    let timed_out =
        tokio::time::timeout(std::time::Duration::from_millis(50), server.recv()).await;
    assert!(timed_out.is_err(), "no complete line yet");

    raw.write_all(b"12\n").await.unwrap();
    assert_eq!(server.recv().await.unwrap().as_deref(), Some("select 12"));
}

#[tokio::test]
async fn test_line_recv_returns_none_on_client_close() {
    let mut transport = LineTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();
    let server_handle = tokio::spawn(async move { transport.accept().await.unwrap() });

    let client = LineConnection::connect(addr).await.unwrap();
    let server = server_handle.await.unwrap();

    client.close().await.unwrap();
    let result = server.recv().await.expect("recv should not error");
    assert!(result.is_none(), "should return None on client close");
}

#[tokio::test]
async fn test_line_send_rejects_embedded_newline() {
    let mut transport = LineTransport::bind("127.0.0.1:0").await.unwrap();
    let addr = transport.local_addr().unwrap();
    let server_handle = tokio::spawn(async move { transport.accept().await.unwrap() });

    let raw = TcpStream::connect(addr).await.unwrap();
    let server = server_handle.await.unwrap();

    let err = server.send("msg 0 a\nmsg 0 b").await.unwrap_err();
    assert!(matches!(err, TransportError::EmbeddedNewline));

    // Nothing reached the peer; the next valid line is the first one seen.
    server.send("info ok").await.unwrap();
    let mut lines = BufReader::new(raw).lines();
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("info ok"));
}

// =========================================================================
// WebSocket transport
// =========================================================================

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use realmforge_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    /// Helper: connects a tokio-tungstenite client to the given address.
    async fn connect_client(
        addr: std::net::SocketAddr,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap();

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(addr).await;
        let server_conn = server_handle.await.expect("task should complete");

        // --- Server sends, client receives ---
        server_conn.send("exc_close 0").await.unwrap();
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "exc_close 0");

        // --- Client sends, server receives ---
        client_ws
            .send(Message::text("req_exc 1 42".to_string()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, "req_exc 1 42");

        // --- Binary frames are accepted when they hold UTF-8 ---
        client_ws
            .send(Message::Binary(b"preq".to_vec().into()))
            .await
            .unwrap();
        assert_eq!(server_conn.recv().await.unwrap().as_deref(), Some("preq"));

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }
}
