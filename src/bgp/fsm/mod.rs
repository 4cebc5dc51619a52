//! Per-neighbor session finite state machine.
//!
//! One FSM is one long-running driver task that owns every piece of mutable
//! session state: the current state, the three timers, and (while a TCP
//! connection exists) the connection quartet of socket, inbound message
//! channel, reader-error slot and reader task. Each state is an async
//! handler that suspends in a single `select!` and returns the next state;
//! the driver loop applies it through the transition guard and emits one
//! event per state entry.
//!
//! Every suspension point selects on the disable channel, so a shutdown
//! request is honored with bounded latency from any state: the handler
//! performs its state's cleanup duties (Cease when a session exists, timer
//! drain, quartet teardown) and drains into the terminal `Disabled` state,
//! where the driver acknowledges the request and exits.

pub mod error;
pub(crate) mod reader;
pub mod state;
pub(crate) mod timer;
pub mod validation;


use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::bgp::message::{
    KeepaliveMessage, Message, MessageType, NotificationMessage, OpenMessage,
};
use crate::event::Event;
use crate::neighbor::{LocalIdentity, NeighborConfig};

pub use error::{NeighborError, OpenError, ReadError};
pub use state::FsmState;
pub use validation::{keepalive_interval, validate_open, Negotiated};

use timer::Timer;

/// Fixed interval between connection attempts.
const CONNECT_RETRY_TIME: Duration = Duration::from_secs(5);

/// Capacity of the inbound channel the reader fills.
const INBOUND_BUFFER: usize = 16;

/// Handle to a running session FSM.
///
/// The driver task owns all mutable session state; this handle only reads
/// the published state and requests shutdown.
#[derive(Debug)]
pub(crate) struct Fsm {
    state: watch::Receiver<FsmState>,
    disable: mpsc::Sender<oneshot::Sender<()>>,
}

impl Fsm {
    /// Start a driver for one neighbor, reporting on `events`. `port` is
    /// the TCP port sessions are dialed to.
    pub(crate) fn start(
        config: Arc<NeighborConfig>,
        local: LocalIdentity,
        events: mpsc::Sender<Event>,
        port: u16,
    ) -> Fsm {
        let (state_tx, state_rx) = watch::channel(FsmState::Idle);
        let (disable_tx, disable_rx) = mpsc::channel(1);

        let hold_time = config.hold_time;
        let driver = Driver {
            config,
            local,
            port,
            events,
            state: state_tx,
            disable: disable_rx,
            pending_ack: None,
            conn: None,
            hold_time,
            keepalive_time: keepalive_interval(hold_time),
            connect_retry_timer: Timer::new(),
            hold_timer: Timer::new(),
            keepalive_timer: Timer::new(),
        };
        tokio::spawn(driver.run());

        Fsm {
            state: state_rx,
            disable: disable_tx,
        }
    }

    pub(crate) fn state(&self) -> FsmState {
        *self.state.borrow()
    }

    /// Request shutdown and wait until the driver has released every
    /// resource: timers drained, reader joined, socket closed. Idempotent;
    /// returns immediately once the FSM is disabled.
    pub(crate) async fn shut(&self) {
        if self.state() == FsmState::Disabled {
            return;
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.disable.send(ack_tx).await.is_err() {
            // driver already exited
            return;
        }
        let _ = ack_rx.await;
    }
}

/// Marker: a shutdown request (or a dead event stream) preempted whatever
/// the driver was doing.
struct ShutdownRequested;

/// The connection quartet: socket write half, inbound message channel,
/// reader error slot, and the reader task itself. Created together on a
/// successful dial, destroyed together in [`Driver::cleanup_conn`].
struct Conn {
    wr: OwnedWriteHalf,
    inbound: mpsc::Receiver<Message>,
    reader_errors: mpsc::Receiver<ReadError>,
    reader_shutdown: Option<oneshot::Sender<()>>,
    reader: JoinHandle<()>,
}

/// What woke a connected state handler up.
enum Wake {
    Disable(Option<oneshot::Sender<()>>),
    ReaderErr(ReadError),
    HoldExpired,
    KeepaliveExpired,
    Inbound(Message),
}

struct Driver {
    config: Arc<NeighborConfig>,
    local: LocalIdentity,
    port: u16,
    events: mpsc::Sender<Event>,
    state: watch::Sender<FsmState>,
    disable: mpsc::Receiver<oneshot::Sender<()>>,
    /// Acknowledgement for an in-flight `shut`, fired from the Disabled sink.
    pending_ack: Option<oneshot::Sender<()>>,
    conn: Option<Conn>,
    /// Negotiated hold time; starts at the configured value for every
    /// session and may be reduced by OPEN validation.
    hold_time: Duration,
    keepalive_time: Duration,
    connect_retry_timer: Timer,
    hold_timer: Timer,
    keepalive_timer: Timer,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let state = *self.state.borrow();

            if state != FsmState::Disabled {
                let event = Event::NeighborStateTransition {
                    config: Arc::clone(&self.config),
                    state,
                };
                if self.emit(event).await.is_err() {
                    self.transition(FsmState::Disabled);
                    continue;
                }
            }

            let next = match state {
                FsmState::Disabled => {
                    // shutdown may have preempted a state-entry emit, in
                    // which case the handler's cleanup never ran
                    self.cleanup_conn().await;
                    if let Some(ack) = self.pending_ack.take() {
                        let _ = ack.send(());
                    }
                    return;
                }
                FsmState::Idle => self.idle(),
                FsmState::Connect => self.connect().await,
                FsmState::Active => self.active().await,
                FsmState::OpenSent => self.open_sent().await,
                FsmState::OpenConfirm => self.open_confirm().await,
                FsmState::Established => self.established().await,
            };
            self.transition(next);
        }
    }

    /// Apply the next state through the transition guard. The driver is the
    /// sole writer; external readers snapshot through the watch channel.
    fn transition(&mut self, next: FsmState) {
        let current = *self.state.borrow();
        assert!(
            current.permits(next),
            "invalid state transition: {current} -> {next}"
        );
        self.state.send_replace(next);
    }

    /// Forward an event to the speaker, racing the disable channel so a
    /// blocked emit never delays shutdown. A dropped event receiver is
    /// treated the same way: the session cannot do useful work without a
    /// consumer, so it drains to Disabled.
    async fn emit(&mut self, event: Event) -> Result<(), ShutdownRequested> {
        tokio::select! {
            sent = self.events.send(event) => sent.map_err(|_| ShutdownRequested),
            ack = self.disable.recv() => {
                self.pending_ack = ack;
                Err(ShutdownRequested)
            }
        }
    }

    fn idle(&mut self) -> FsmState {
        FsmState::Connect
    }

    async fn connect(&mut self) -> FsmState {
        self.connect_retry_timer.reset(CONNECT_RETRY_TIME);

        let addr = SocketAddr::new(self.config.address, self.port);
        debug!(neighbor = %self.config.address, "dialing neighbor");
        let dial = TcpStream::connect(addr);
        tokio::pin!(dial);

        let dialed = tokio::select! {
            ack = self.disable.recv() => {
                self.pending_ack = ack;
                self.connect_retry_timer.drain();
                return FsmState::Disabled;
            }
            dialed = &mut dial => {
                self.connect_retry_timer.drain();
                dialed
            }
            _ = self.connect_retry_timer.fired() => {
                // The retry timer beat the dial. Give the dial one final
                // immediate poll: adopt a connection that raced in,
                // otherwise start the next attempt.
                match tokio::time::timeout(Duration::ZERO, &mut dial).await {
                    Ok(Ok(stream)) => Ok(stream),
                    _ => return FsmState::Connect,
                }
            }
        };

        let stream = match dialed {
            Ok(stream) => stream,
            Err(err) => {
                debug!(neighbor = %self.config.address, error = %err, "dial failed");
                let event = Event::NeighborErr {
                    config: Arc::clone(&self.config),
                    error: NeighborError::Connect(err),
                };
                if self.emit(event).await.is_err() {
                    return FsmState::Disabled;
                }
                return FsmState::Active;
            }
        };

        debug!(neighbor = %self.config.address, "connection established");
        self.install_conn(stream);
        self.send_open().await
    }

    /// Send our OPEN on the fresh connection; entry into OpenSent.
    async fn send_open(&mut self) -> FsmState {
        let open = OpenMessage::new(
            self.local.asn,
            self.config.hold_time.as_secs() as u16,
            self.local.router_id,
        );
        debug!(
            neighbor = %self.config.address,
            asn = self.local.asn,
            hold_time = open.hold_time,
            "sending OPEN"
        );

        match self.send(open.to_bytes()).await {
            Ok(()) => FsmState::OpenSent,
            Err(err) => {
                let event = Event::NeighborErr {
                    config: Arc::clone(&self.config),
                    error: NeighborError::Write {
                        message: "open",
                        source: err,
                    },
                };
                if self.emit(event).await.is_err() {
                    self.cleanup_conn().await;
                    return FsmState::Disabled;
                }
                self.cleanup_conn().await;
                FsmState::Connect
            }
        }
    }

    async fn active(&mut self) -> FsmState {
        self.connect_retry_timer.reset(CONNECT_RETRY_TIME);

        tokio::select! {
            ack = self.disable.recv() => {
                self.pending_ack = ack;
                self.connect_retry_timer.drain();
                FsmState::Disabled
            }
            _ = self.connect_retry_timer.fired() => FsmState::Connect,
        }
    }

    async fn open_sent(&mut self) -> FsmState {
        self.hold_timer.reset(self.hold_time);

        let wake = {
            let conn = self.conn.as_mut().expect("no connection in open-sent state");
            tokio::select! {
                ack = self.disable.recv() => Wake::Disable(ack),
                Some(err) = conn.reader_errors.recv() => Wake::ReaderErr(err),
                _ = self.hold_timer.fired() => Wake::HoldExpired,
                Some(message) = conn.inbound.recv() => Wake::Inbound(message),
            }
        };

        match wake {
            Wake::Disable(ack) => {
                self.pending_ack = ack;
                self.send_cease().await;
                self.hold_timer.drain();
                self.cleanup_conn().await;
                FsmState::Disabled
            }
            Wake::ReaderErr(err) => self.handle_err(err.into(), FsmState::Active).await,
            Wake::HoldExpired => self.handle_hold_expired(FsmState::Idle).await,
            Wake::KeepaliveExpired => unreachable!("keepalive timer dormant in open-sent"),
            Wake::Inbound(Message::Open(open)) => {
                debug!(
                    neighbor = %self.config.address,
                    asn = open.asn,
                    hold_time = open.hold_time,
                    bgp_id = %open.bgp_id,
                    "received OPEN"
                );
                match validate_open(&open, self.config.asn, self.config.hold_time) {
                    Err(err) => self.handle_err(err.into(), FsmState::Idle).await,
                    Ok(negotiated) => {
                        self.hold_time = negotiated.hold_time;
                        self.keepalive_time = negotiated.keepalive;
                        if let Err(err) = self.send(KeepaliveMessage::to_bytes()).await {
                            let error = NeighborError::Write {
                                message: "keepalive",
                                source: err,
                            };
                            return self.handle_err(error, FsmState::Idle).await;
                        }
                        self.hold_timer.reset(self.hold_time);
                        FsmState::OpenConfirm
                    }
                }
            }
            Wake::Inbound(Message::Notification(notification)) => {
                warn!(
                    neighbor = %self.config.address,
                    notification = %notification,
                    "received NOTIFICATION"
                );
                let event = Event::NeighborNotificationReceived {
                    config: Arc::clone(&self.config),
                    notification,
                };
                let disabled = self.emit(event).await.is_err();
                self.hold_timer.drain();
                self.cleanup_conn().await;
                if disabled {
                    FsmState::Disabled
                } else {
                    FsmState::Idle
                }
            }
            Wake::Inbound(message) => {
                // neither OPEN nor NOTIFICATION: drop the session without a
                // NOTIFICATION of our own
                debug!(
                    neighbor = %self.config.address,
                    kind = message.kind(),
                    "unexpected message in open-sent state"
                );
                self.hold_timer.drain();
                self.cleanup_conn().await;
                FsmState::Idle
            }
        }
    }

    async fn open_confirm(&mut self) -> FsmState {
        let wake = {
            let conn = self
                .conn
                .as_mut()
                .expect("no connection in open-confirm state");
            tokio::select! {
                ack = self.disable.recv() => Wake::Disable(ack),
                Some(err) = conn.reader_errors.recv() => Wake::ReaderErr(err),
                _ = self.hold_timer.fired() => Wake::HoldExpired,
                Some(message) = conn.inbound.recv() => Wake::Inbound(message),
            }
        };

        match wake {
            Wake::Disable(ack) => {
                self.pending_ack = ack;
                self.send_cease().await;
                self.hold_timer.drain();
                self.cleanup_conn().await;
                FsmState::Disabled
            }
            Wake::ReaderErr(err) => self.handle_err(err.into(), FsmState::Idle).await,
            Wake::HoldExpired => self.handle_hold_expired(FsmState::Idle).await,
            Wake::KeepaliveExpired => unreachable!("keepalive timer dormant in open-confirm"),
            Wake::Inbound(Message::Keepalive) => {
                trace!(neighbor = %self.config.address, "received KEEPALIVE");
                self.hold_timer.reset(self.hold_time);
                self.keepalive_timer.reset(self.keepalive_time);
                FsmState::Established
            }
            Wake::Inbound(message) => {
                let error = NeighborError::UnexpectedMessage {
                    kind: message.kind(),
                    state: FsmState::OpenConfirm,
                };
                self.handle_err(error, FsmState::Idle).await
            }
        }
    }

    async fn established(&mut self) -> FsmState {
        loop {
            let wake = {
                let conn = self
                    .conn
                    .as_mut()
                    .expect("no connection in established state");
                tokio::select! {
                    ack = self.disable.recv() => Wake::Disable(ack),
                    Some(err) = conn.reader_errors.recv() => Wake::ReaderErr(err),
                    _ = self.hold_timer.fired() => Wake::HoldExpired,
                    _ = self.keepalive_timer.fired() => Wake::KeepaliveExpired,
                    Some(message) = conn.inbound.recv() => Wake::Inbound(message),
                }
            };

            match wake {
                Wake::Disable(ack) => {
                    self.pending_ack = ack;
                    self.send_cease().await;
                    self.hold_timer.drain();
                    self.cleanup_conn().await;
                    return FsmState::Disabled;
                }
                Wake::ReaderErr(err) => return self.handle_err(err.into(), FsmState::Idle).await,
                Wake::HoldExpired => return self.handle_hold_expired(FsmState::Idle).await,
                Wake::KeepaliveExpired => {
                    trace!(neighbor = %self.config.address, "sending KEEPALIVE");
                    if let Err(err) = self.send(KeepaliveMessage::to_bytes()).await {
                        let error = NeighborError::Write {
                            message: "keepalive",
                            source: err,
                        };
                        return self.handle_err(error, FsmState::Idle).await;
                    }
                    self.keepalive_timer.reset(self.keepalive_time);
                }
                Wake::Inbound(Message::Keepalive) => {
                    trace!(neighbor = %self.config.address, "received KEEPALIVE");
                    self.hold_timer.reset(self.hold_time);
                }
                Wake::Inbound(Message::Update(update)) => {
                    self.hold_timer.reset(self.hold_time);
                    debug!(
                        neighbor = %self.config.address,
                        len = update.len(),
                        "received UPDATE"
                    );
                    let event = Event::NeighborUpdateReceived {
                        config: Arc::clone(&self.config),
                        update,
                    };
                    if self.emit(event).await.is_err() {
                        self.send_cease().await;
                        self.hold_timer.drain();
                        self.cleanup_conn().await;
                        return FsmState::Disabled;
                    }
                }
                Wake::Inbound(Message::Notification(notification)) => {
                    warn!(
                        neighbor = %self.config.address,
                        notification = %notification,
                        "received NOTIFICATION"
                    );
                    let event = Event::NeighborNotificationReceived {
                        config: Arc::clone(&self.config),
                        notification,
                    };
                    let disabled = self.emit(event).await.is_err();
                    self.hold_timer.drain();
                    self.cleanup_conn().await;
                    return if disabled {
                        FsmState::Disabled
                    } else {
                        FsmState::Idle
                    };
                }
                Wake::Inbound(Message::Open(_)) => {
                    let error = NeighborError::UnexpectedMessage {
                        kind: "OPEN",
                        state: FsmState::Established,
                    };
                    warn!(neighbor = %self.config.address, error = %error, "neighbor error");
                    let event = Event::NeighborErr {
                        config: Arc::clone(&self.config),
                        error,
                    };
                    let disabled = self.emit(event).await.is_err();
                    if !disabled {
                        self.send_notification(NotificationMessage::bad_message_type(
                            MessageType::Open,
                        ))
                        .await;
                    }
                    self.hold_timer.drain();
                    self.cleanup_conn().await;
                    return if disabled {
                        FsmState::Disabled
                    } else {
                        FsmState::Idle
                    };
                }
            }
        }
    }

    /// Common error path: send any NOTIFICATION the error carries, surface
    /// the error, drain the hold timer, drop the session and continue at
    /// `next` (or `Disabled` if a shutdown request preempted the emit).
    async fn handle_err(&mut self, error: NeighborError, next: FsmState) -> FsmState {
        if let Some(notification) = error.notification() {
            self.send_notification(notification).await;
        }
        warn!(neighbor = %self.config.address, error = %error, "neighbor error");

        let event = Event::NeighborErr {
            config: Arc::clone(&self.config),
            error,
        };
        let disabled = self.emit(event).await.is_err();
        self.hold_timer.drain();
        self.cleanup_conn().await;
        if disabled {
            FsmState::Disabled
        } else {
            next
        }
    }

    /// The peer went silent past the negotiated hold time: notify it, tell
    /// the speaker, drop the session.
    async fn handle_hold_expired(&mut self, next: FsmState) -> FsmState {
        warn!(neighbor = %self.config.address, "hold timer expired");
        self.send_notification(NotificationMessage::hold_timer_expired())
            .await;

        let event = Event::NeighborHoldTimerExpired {
            config: Arc::clone(&self.config),
        };
        let disabled = self.emit(event).await.is_err();
        self.cleanup_conn().await;
        if disabled {
            FsmState::Disabled
        } else {
            next
        }
    }

    /// Install the connection quartet for a freshly dialed stream and reset
    /// timer negotiation to the configured values.
    fn install_conn(&mut self, stream: TcpStream) {
        let _ = stream.set_nodelay(true);
        let (rd, wr) = stream.into_split();

        let (inbound_tx, inbound) = mpsc::channel(INBOUND_BUFFER);
        let (error_tx, reader_errors) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader = reader::spawn(rd, inbound_tx, error_tx, shutdown_rx);

        self.conn = Some(Conn {
            wr,
            inbound,
            reader_errors,
            reader_shutdown: Some(shutdown_tx),
            reader,
        });
        self.hold_time = self.config.hold_time;
        self.keepalive_time = keepalive_interval(self.hold_time);
    }

    /// Tear the quartet down: stop the reader, close the socket, and wait
    /// for the reader to acknowledge by exiting.
    async fn cleanup_conn(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.reader_shutdown.take();
            let _ = conn.wr.shutdown().await;
            let _ = conn.reader.await;
        }
        self.keepalive_timer.drain();
    }

    async fn send(&mut self, bytes: Bytes) -> io::Result<()> {
        let conn = self.conn.as_mut().expect("send without a connection");
        conn.wr.write_all(&bytes).await
    }

    async fn send_notification(&mut self, notification: NotificationMessage) {
        debug!(
            neighbor = %self.config.address,
            notification = %notification,
            "sending NOTIFICATION"
        );
        if let Err(err) = self.send(notification.to_bytes()).await {
            debug!(neighbor = %self.config.address, error = %err, "failed to send NOTIFICATION");
        }
    }

    async fn send_cease(&mut self) {
        if self.conn.is_some() {
            self.send_notification(NotificationMessage::cease()).await;
        }
    }
}
