use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

use crate::{
    infra::secrets::redact_url,
    realtime::transport::{SocketConnector, SocketLink, TransportError, TransportInput},
};

const SOCKET_CONNECT_FAILED: &str = "SOCKET_CONNECT_FAILED";
const SOCKET_READ_FAILED: &str = "SOCKET_READ_FAILED";
const SOCKET_WRITE_FAILED: &str = "SOCKET_WRITE_FAILED";

/// Opens real WebSocket connections with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl SocketConnector for WsConnector {
    fn open(
        &self,
        connection_id: u64,
        url: Url,
        events: mpsc::UnboundedSender<TransportInput>,
    ) -> Box<dyn SocketLink> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(connection_id, url, out_rx, events));

        Box::new(WsLink {
            out_tx: Some(out_tx),
        })
    }
}

/// Handle to one socket task. Dropping the outbound sender makes the task
/// send a close frame and exit.
#[derive(Debug)]
struct WsLink {
    out_tx: Option<mpsc::UnboundedSender<String>>,
}

impl SocketLink for WsLink {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let out_tx = self.out_tx.as_ref().ok_or(TransportError::NotConnected)?;
        out_tx.send(text).map_err(|_| TransportError::LinkClosed)
    }

    fn close(&mut self) {
        self.out_tx = None;
    }
}

async fn run_socket(
    connection_id: u64,
    url: Url,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportInput>,
) {
    let target = redact_url(&url);
    tracing::debug!(connection_id, url = %target, "opening chat socket");

    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(error) => {
            tracing::warn!(
                code = SOCKET_CONNECT_FAILED,
                connection_id,
                url = %target,
                error = %error,
                "chat socket connect failed"
            );
            let _ = events.send(TransportInput::Closed {
                connection_id,
                reason: format!("connect failed: {error}"),
            });
            return;
        }
    };

    if events.send(TransportInput::Opened { connection_id }).is_err() {
        return;
    }

    let (mut sink, mut source) = stream.split();
    let reason = loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(text) => {
                    if let Err(error) = sink.send(WsMessage::Text(text.into())).await {
                        tracing::warn!(
                            code = SOCKET_WRITE_FAILED,
                            connection_id,
                            error = %error,
                            "chat socket write failed"
                        );
                        break format!("write failed: {error}");
                    }
                }
                None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    tracing::debug!(connection_id, "chat socket closed locally");
                    return;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(WsMessage::Text(text))) => {
                    let frame = TransportInput::Frame {
                        connection_id,
                        text: text.as_str().to_owned(),
                    };
                    if events.send(frame).is_err() {
                        return;
                    }
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    break frame
                        .map(|frame| format!("closed by server: {} {}", frame.code, frame.reason.as_str()))
                        .unwrap_or_else(|| "closed by server".to_owned());
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    tracing::warn!(
                        code = SOCKET_READ_FAILED,
                        connection_id,
                        error = %error,
                        "chat socket read failed"
                    );
                    break format!("read failed: {error}");
                }
                None => break "stream ended".to_owned(),
            },
        }
    };

    let _ = events.send(TransportInput::Closed {
        connection_id,
        reason,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_link_rejects_sends() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let mut link = WsLink {
            out_tx: Some(out_tx),
        };

        assert!(link.send_text("{}".to_owned()).is_ok());
        link.close();

        assert!(matches!(
            link.send_text("{}".to_owned()),
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn unreachable_server_reports_close() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let url = Url::parse("ws://127.0.0.1:9/chat?token=abc").expect("valid url");

        let _link = WsConnector.open(7, url, events_tx);

        match events_rx.recv().await {
            Some(TransportInput::Closed { connection_id, .. }) => assert_eq!(connection_id, 7),
            other => panic!("expected close event, got {other:?}"),
        }
    }
}
