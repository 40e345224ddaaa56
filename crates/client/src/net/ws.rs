use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

use locshare::net::{CloseCode, Transport, TransportError};
use locshare::session::SessionKey;

use crate::driver::DriverEvent;

enum Outgoing {
    Frame(String),
    Close(CloseCode),
}

/// WebSocket transport backed by a tokio task per connection.
///
/// Each `open` bumps the generation; events from an older connection carry
/// the old generation and are dropped by the driver.
pub struct WsTransport {
    key: SessionKey,
    events: mpsc::UnboundedSender<DriverEvent>,
    outgoing: Option<mpsc::UnboundedSender<Outgoing>>,
    generation: u64,
}

impl WsTransport {
    pub fn new(key: SessionKey, events: mpsc::UnboundedSender<DriverEvent>) -> Self {
        Self {
            key,
            events,
            outgoing: None,
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Transport for WsTransport {
    fn open(&mut self, url: &str) -> Result<(), TransportError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(TransportError::Open("no async runtime".to_string()));
        }

        self.generation += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.outgoing = Some(tx);

        tokio::spawn(connection_loop(
            self.key,
            self.generation,
            url.to_string(),
            rx,
            self.events.clone(),
        ));

        Ok(())
    }

    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let outgoing = self
            .outgoing
            .as_ref()
            .ok_or_else(|| TransportError::Send("socket is not open".to_string()))?;

        outgoing
            .send(Outgoing::Frame(frame))
            .map_err(|_| TransportError::Send("connection task has exited".to_string()))
    }

    fn close(&mut self, code: CloseCode) {
        if let Some(outgoing) = self.outgoing.take() {
            let _ = outgoing.send(Outgoing::Close(code));
        }
        self.generation += 1;
    }
}

async fn connection_loop(
    key: SessionKey,
    generation: u64,
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: mpsc::UnboundedSender<DriverEvent>,
) {
    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(e) => {
            log::debug!("[{}] connect to {} failed: {}", key, url, e);
            let _ = events.send(DriverEvent::Failed {
                key,
                generation,
                error: TransportError::Connection(e.to_string()),
            });
            let _ = events.send(DriverEvent::Closed {
                key,
                generation,
                code: CloseCode::ABNORMAL,
            });
            return;
        }
    };

    let _ = events.send(DriverEvent::Opened { key, generation });

    let (mut ws_tx, mut ws_rx) = ws.split();

    let code = loop {
        tokio::select! {
            out = outgoing.recv() => {
                match out {
                    Some(Outgoing::Frame(text)) => {
                        if let Err(e) = ws_tx.send(WsMessage::Text(text.into())).await {
                            let _ = events.send(DriverEvent::Failed {
                                key,
                                generation,
                                error: TransportError::Send(e.to_string()),
                            });
                            break CloseCode::ABNORMAL;
                        }
                    }
                    Some(Outgoing::Close(code)) => {
                        let frame = CloseFrame {
                            code: code.0.into(),
                            reason: String::new().into(),
                        };
                        let _ = ws_tx.send(WsMessage::Close(Some(frame))).await;
                        break code;
                    }
                    None => break CloseCode::NORMAL,
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let _ = events.send(DriverEvent::Frame {
                            key,
                            generation,
                            text: text.to_string(),
                        });
                    }
                    Some(Ok(WsMessage::Close(frame))) => break received_close_code(frame),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = events.send(DriverEvent::Failed {
                            key,
                            generation,
                            error: TransportError::Connection(e.to_string()),
                        });
                        break CloseCode::ABNORMAL;
                    }
                    None => break CloseCode::ABNORMAL,
                }
            }
        }
    };

    log::debug!("[{}] socket closed with code {}", key, code);
    let _ = events.send(DriverEvent::Closed {
        key,
        generation,
        code,
    });
}

fn received_close_code(frame: Option<CloseFrame>) -> CloseCode {
    frame
        .map(|f| CloseCode(u16::from(f.code)))
        .unwrap_or(CloseCode::NO_STATUS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_without_frame_is_no_status() {
        assert_eq!(received_close_code(None), CloseCode::NO_STATUS);
    }

    #[test]
    fn test_close_frame_code_is_kept() {
        let frame = CloseFrame {
            code: 1000u16.into(),
            reason: String::new().into(),
        };
        assert_eq!(received_close_code(Some(frame)), CloseCode::NORMAL);

        let frame = CloseFrame {
            code: 1011u16.into(),
            reason: String::from("restarting").into(),
        };
        assert_eq!(received_close_code(Some(frame)), CloseCode::SERVER_ERROR);
    }
}
