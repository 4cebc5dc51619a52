//! Connection reader: the second task of a live session.
//!
//! Exactly one reader exists per FSM while a TCP connection does. It owns
//! the read half of the socket and the framer, publishes parsed messages on
//! the inbound channel and its first terminal error on the error channel,
//! then exits. The driver stops it by dropping the shutdown sender and
//! waits on the returned join handle.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::bgp::message::{Framer, Message};

use super::error::ReadError;

pub(crate) fn spawn<R>(
    stream: R,
    inbound: mpsc::Sender<Message>,
    errors: mpsc::Sender<ReadError>,
    shutdown: oneshot::Receiver<()>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(read_loop(stream, inbound, errors, shutdown))
}

async fn read_loop<R>(
    mut stream: R,
    inbound: mpsc::Sender<Message>,
    errors: mpsc::Sender<ReadError>,
    mut shutdown: oneshot::Receiver<()>,
) where
    R: AsyncRead + Unpin,
{
    let mut framer = Framer::new();
    loop {
        let read = tokio::select! {
            biased;
            _ = &mut shutdown => return,
            read = stream.read_buf(framer.read_buffer()) => read,
        };

        let error = match read {
            Ok(0) => Some(ReadError::Closed),
            Ok(_) => loop {
                match framer.next_message() {
                    Ok(Some(message)) => {
                        // shutdown must win over a full inbound channel
                        tokio::select! {
                            biased;
                            _ = &mut shutdown => return,
                            sent = inbound.send(message) => {
                                if sent.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Ok(None) => break None,
                    Err(err) => break Some(ReadError::Decode(err)),
                }
            },
            Err(err) => Some(ReadError::Io(err)),
        };

        if let Some(error) = error {
            tokio::select! {
                biased;
                _ = &mut shutdown => {}
                _ = errors.send(error) => {}
            }
            return;
        }
    }
}
