//! rumqttc transport: synchronous client plus a connection thread.
//!
//! Publishing uses `try_publish`, which only enqueues into the client's
//! request channel and never blocks. The connection thread drives the
//! rumqttc event loop, reconnects after errors and tells the adapter about
//! every new session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel as xch;
use rumqttc::{Client, Event, LastWill, MqttOptions, Outgoing, Packet, QoS};
use scale_config::MqttCfg;
use scale_traits::Publisher;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adapter::Outbound;
use crate::topics::Topics;

/// Capacity of rumqttc's request queue.
const REQUEST_CAP: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mqtt client: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("spawn connection thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub fn mqtt_options(cfg: &MqttCfg, topics: &Topics) -> MqttOptions {
    let mut opts = MqttOptions::new(cfg.effective_client_id(), &cfg.host, cfg.port);
    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs));
    if cfg.has_auth() {
        let user = cfg.username.clone().unwrap_or_default();
        opts.set_credentials(user, cfg.password.clone().unwrap_or_default());
    }
    opts.set_last_will(LastWill::new(
        &topics.bridge,
        "offline",
        QoS::AtLeastOnce,
        true,
    ));
    opts
}

#[derive(Clone)]
pub struct RumqttPublisher {
    client: Client,
}

impl std::fmt::Debug for RumqttPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RumqttPublisher").finish_non_exhaustive()
    }
}

impl RumqttPublisher {
    /// Send DISCONNECT; the connection thread exits once it goes out.
    pub fn disconnect(&mut self) -> Result<(), TransportError> {
        self.client.disconnect()?;
        Ok(())
    }
}

impl Publisher for RumqttPublisher {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, retain, payload.to_vec())
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    }
}

/// Live broker connection: the publisher half and the event-loop thread.
#[derive(Debug)]
pub struct MqttTransport {
    pub publisher: RumqttPublisher,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl MqttTransport {
    /// Start connecting; `SessionStarted` goes to `session_tx` on every CONNACK.
    pub fn start(
        cfg: &MqttCfg,
        topics: &Topics,
        session_tx: xch::Sender<Outbound>,
    ) -> Result<Self, TransportError> {
        let (client, mut connection) = Client::new(mqtt_options(cfg, topics), REQUEST_CAP);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let broker = format!("{}:{}", cfg.host, cfg.port);

        let handle = thread::Builder::new()
            .name("mqtt-conn".into())
            .spawn(move || {
                for notification in connection.iter() {
                    match notification {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            info!(broker = %broker, code = ?ack.code, "mqtt connected");
                            if session_tx.send(Outbound::SessionStarted).is_err() {
                                break;
                            }
                        }
                        Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                            debug!("mqtt disconnect sent");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            if stop_flag.load(Ordering::Relaxed) {
                                break;
                            }
                            warn!(broker = %broker, error = %e, "mqtt connection error; retrying");
                            thread::sleep(RECONNECT_DELAY);
                        }
                    }
                }
                debug!("mqtt connection thread exit");
            })?;

        Ok(Self {
            publisher: RumqttPublisher { client },
            stop,
            handle,
        })
    }

    /// Disconnect and wait for the connection thread.
    pub fn shutdown(mut self) -> Result<(), TransportError> {
        self.stop.store(true, Ordering::Relaxed);
        let result = self.publisher.disconnect();
        if self.handle.join().is_err() {
            warn!("mqtt connection thread panicked");
        }
        result
    }
}
