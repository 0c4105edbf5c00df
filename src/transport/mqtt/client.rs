//! MQTT v5 broker client built on rumqttc
//!
//! [`MqttBroker`] implements the synchronous [`BrokerClient`] surface on top
//! of rumqttc's `AsyncClient`. `loop_start` spawns a dedicated network thread
//! that drives the `EventLoop` on its own current-thread runtime and invokes
//! the registered [`NetworkCallbacks`] in order, between polls and outside
//! any runtime context.
//!
//! Requests never fail because the bounded request channel is full: they
//! wait in an ordered overflow queue that the network thread drains as the
//! event loop makes room.
//!
//! The loop never reconnects. A failed connect is reported through
//! `on_connect` with a non-zero code, a lost session through `on_disconnect`,
//! and in both cases the thread ends.

use super::connection::{build_mqtt_options, to_mqtt_qos, SessionSettings, REQUEST_CHANNEL_CAPACITY};
use super::message_handler::{EventRoute, MessageHandler, CONNECTION_LOST, CONNECT_FAILED};
use crate::transport::{BrokerClient, BrokerError, NetworkCallbacks, QoS, CONNECT_SUCCESS};
use rumqttc::v5::{AsyncClient, ConnectionError, Event, EventLoop};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use tokio::runtime::Builder;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Name of the thread running the network loop
pub const NETWORK_THREAD_NAME: &str = "agentwire-network";

/// rumqttc-backed [`BrokerClient`]
///
/// No ambient tokio runtime is required.
pub struct MqttBroker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    this: Weak<BrokerInner>,
    client_id: String,
    settings: Mutex<SessionSettings>,
    callbacks: Mutex<Option<Arc<dyn NetworkCallbacks>>>,
    generations: AtomicU64,
    session: Mutex<Option<Session>>,
    event_loop: Mutex<Option<EventLoop>>,
    network_loop: Mutex<Option<NetworkLoop>>,
}

struct NetworkLoop {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Request side of one connect attempt
struct Session {
    generation: u64,
    client: AsyncClient,
    overflow: VecDeque<QueuedRequest>,
    closed: bool,
}

/// A request waiting for room in the request channel
#[derive(Debug, Clone)]
enum QueuedRequest {
    Subscribe {
        topic: String,
        qos: QoS,
    },
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    },
    Disconnect,
}

impl QueuedRequest {
    fn try_submit(&self, client: &AsyncClient) -> bool {
        let submitted = match self {
            QueuedRequest::Subscribe { topic, qos } => {
                client.try_subscribe(topic.as_str(), to_mqtt_qos(*qos))
            }
            QueuedRequest::Publish {
                topic,
                payload,
                qos,
                retain,
            } => client.try_publish(topic.as_str(), to_mqtt_qos(*qos), *retain, payload.clone()),
            QueuedRequest::Disconnect => client.try_disconnect(),
        };
        submitted.is_ok()
    }
}

impl Session {
    /// Move queued requests into the channel until it is full again
    fn flush(&mut self) {
        while let Some(request) = self.overflow.front() {
            if !request.try_submit(&self.client) {
                break;
            }
            self.overflow.pop_front();
        }
    }
}

impl MqttBroker {
    /// `client_id` is also used as the MQTT client identifier
    pub fn new(client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        let inner = Arc::new_cyclic(|this| BrokerInner {
            this: this.clone(),
            client_id,
            settings: Mutex::new(SessionSettings::default()),
            callbacks: Mutex::new(None),
            generations: AtomicU64::new(0),
            session: Mutex::new(None),
            event_loop: Mutex::new(None),
            network_loop: Mutex::new(None),
        });
        Self { inner }
    }

    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Settings that will be applied on the next connect
    pub fn session_settings(&self) -> SessionSettings {
        lock(&self.inner.settings).clone()
    }

    /// True while the network thread is running
    pub fn is_loop_running(&self) -> bool {
        lock(&self.inner.network_loop)
            .as_ref()
            .is_some_and(|network_loop| !network_loop.handle.is_finished())
    }

    /// Requests waiting for room in the request channel
    pub fn queued_requests(&self) -> usize {
        lock(&self.inner.session)
            .as_ref()
            .map_or(0, |session| session.overflow.len())
    }
}

impl Drop for MqttBroker {
    fn drop(&mut self) {
        // The network thread holds its own reference to the inner state
        if let Some(network_loop) = lock(&self.inner.network_loop).take() {
            let _ = network_loop.shutdown_tx.send(true);
        }
    }
}

impl BrokerInner {
    fn submit(&self, request: QueuedRequest) -> Result<(), BrokerError> {
        let mut guard = lock(&self.session);
        let session = guard
            .as_mut()
            .filter(|session| !session.closed)
            .ok_or(BrokerError::NotConnected)?;

        session.overflow.push_back(request);
        session.flush();
        if !session.overflow.is_empty() {
            debug!(
                queued = session.overflow.len(),
                capacity = REQUEST_CHANNEL_CAPACITY,
                "Request channel full, request queued"
            );
        }
        Ok(())
    }

    fn flush_session(&self, generation: u64) {
        if let Some(session) = lock(&self.session)
            .as_mut()
            .filter(|session| session.generation == generation)
        {
            session.flush();
        }
    }

    fn close_session(&self, generation: u64) {
        if let Some(session) = lock(&self.session)
            .as_mut()
            .filter(|session| session.generation == generation)
        {
            if !session.overflow.is_empty() {
                warn!(
                    dropped = session.overflow.len(),
                    "Network loop ended with requests still queued"
                );
            }
            session.overflow.clear();
            session.closed = true;
        }
    }

    fn run(
        self: Arc<Self>,
        generation: u64,
        mut event_loop: EventLoop,
        callbacks: Arc<dyn NetworkCallbacks>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let broker: &dyn BrokerClient = &*self;

        let runtime = match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "Failed to build network runtime");
                callbacks.on_connect(broker, CONNECT_FAILED);
                self.close_session(generation);
                return;
            }
        };
        let mut session_up = false;

        loop {
            self.flush_session(generation);

            let Some(polled) = runtime.block_on(next_event(&mut event_loop, &mut shutdown_rx))
            else {
                debug!("Network loop stop requested");
                break;
            };

            match polled {
                Ok(event) => match MessageHandler::route_mqtt_event(&event) {
                    EventRoute::ConnectionAcknowledged { return_code } => {
                        session_up = return_code == CONNECT_SUCCESS;
                        callbacks.on_connect(broker, return_code);
                        if !session_up {
                            break;
                        }
                    }
                    EventRoute::MessageReceived(message) => callbacks.on_message(broker, message),
                    EventRoute::BrokerDisconnected { reason_code } => {
                        warn!(reason_code, "Broker closed the session");
                        if session_up {
                            callbacks.on_disconnect(broker, reason_code.max(1));
                        }
                        break;
                    }
                    EventRoute::DisconnectSent => {
                        if session_up {
                            callbacks.on_disconnect(broker, 0);
                        }
                        break;
                    }
                    EventRoute::Infrastructure => {}
                },
                Err(e) if session_up => {
                    error!(error = %e, "Connection lost");
                    callbacks.on_disconnect(broker, CONNECTION_LOST);
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Connect attempt failed");
                    callbacks.on_connect(broker, MessageHandler::connect_error_code(&e));
                    break;
                }
            }
        }

        self.close_session(generation);
        info!(client_id = %self.client_id, "Network loop stopped");
    }
}

/// Next event from the broker, or `None` once a stop is requested
async fn next_event(
    event_loop: &mut EventLoop,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Option<Result<Event, ConnectionError>> {
    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    return None;
                }
            }
            polled = event_loop.poll() => return Some(polled),
        }
    }
}

impl BrokerClient for BrokerInner {
    fn set_credentials(&self, username: &str, password: &str) -> Result<(), BrokerError> {
        lock(&self.settings).credentials = Some((username.to_string(), password.to_string()));
        Ok(())
    }

    fn enable_tls(&self) -> Result<(), BrokerError> {
        lock(&self.settings).tls = true;
        Ok(())
    }

    fn set_callbacks(&self, callbacks: Arc<dyn NetworkCallbacks>) {
        *lock(&self.callbacks) = Some(callbacks);
    }

    fn connect(&self, host: &str, port: u16, keepalive_secs: u16) -> Result<(), BrokerError> {
        let settings = lock(&self.settings).clone();
        let options = build_mqtt_options(&self.client_id, host, port, keepalive_secs, &settings)?;

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        *lock(&self.session) = Some(Session {
            generation,
            client,
            overflow: VecDeque::new(),
            closed: false,
        });
        *lock(&self.event_loop) = Some(event_loop);

        debug!(host, port, keepalive_secs, tls = settings.tls, "Connection prepared");
        Ok(())
    }

    fn disconnect(&self) -> Result<(), BrokerError> {
        self.submit(QueuedRequest::Disconnect)
    }

    fn loop_start(&self) -> Result<(), BrokerError> {
        let this = self
            .this
            .upgrade()
            .ok_or_else(|| BrokerError::Loop("broker is shutting down".to_string()))?;
        let callbacks = lock(&self.callbacks)
            .clone()
            .ok_or_else(|| BrokerError::Loop("no network callbacks registered".to_string()))?;
        let generation = lock(&self.session)
            .as_ref()
            .map(|session| session.generation)
            .ok_or(BrokerError::NotConnected)?;
        let event_loop = lock(&self.event_loop)
            .take()
            .ok_or(BrokerError::NotConnected)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = thread::Builder::new()
            .name(NETWORK_THREAD_NAME.to_string())
            .spawn(move || this.run(generation, event_loop, callbacks, shutdown_rx))
            .map_err(|e| BrokerError::Loop(format!("failed to spawn network thread: {e}")))?;

        if let Some(previous) = lock(&self.network_loop).replace(NetworkLoop { shutdown_tx, handle }) {
            let _ = previous.shutdown_tx.send(true);
        }
        Ok(())
    }

    fn loop_stop(&self) -> Result<(), BrokerError> {
        // Called from the network thread on disconnect, so signal instead of joining
        if let Some(network_loop) = lock(&self.network_loop).take() {
            let _ = network_loop.shutdown_tx.send(true);
        }
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), BrokerError> {
        self.submit(QueuedRequest::Subscribe {
            topic: topic.to_string(),
            qos,
        })
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), BrokerError> {
        self.submit(QueuedRequest::Publish {
            topic: topic.to_string(),
            payload,
            qos,
            retain,
        })
    }
}

impl BrokerClient for MqttBroker {
    fn set_credentials(&self, username: &str, password: &str) -> Result<(), BrokerError> {
        self.inner.set_credentials(username, password)
    }

    fn enable_tls(&self) -> Result<(), BrokerError> {
        self.inner.enable_tls()
    }

    fn set_callbacks(&self, callbacks: Arc<dyn NetworkCallbacks>) {
        self.inner.set_callbacks(callbacks)
    }

    fn connect(&self, host: &str, port: u16, keepalive_secs: u16) -> Result<(), BrokerError> {
        self.inner.connect(host, port, keepalive_secs)
    }

    fn disconnect(&self) -> Result<(), BrokerError> {
        self.inner.disconnect()
    }

    fn loop_start(&self) -> Result<(), BrokerError> {
        self.inner.loop_start()
    }

    fn loop_stop(&self) -> Result<(), BrokerError> {
        self.inner.loop_stop()
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), BrokerError> {
        self.inner.subscribe(topic, qos)
    }

    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), BrokerError> {
        self.inner.publish(topic, payload, qos, retain)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
