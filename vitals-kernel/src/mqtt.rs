use crate::config::MqttConf;
use crate::health::HealthTracker;
use crate::ingest::ingest_reading;
use crate::store::Stores;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, error, info, warn};
use vitals_core::{ClassifierPolicy, VitalsReading};

pub const READING_TOPIC: &str = "vitals/devices/reading@v1";

/// Décode un paquet MQTT ; `None` si le JSON est invalide ou sans appareil
pub fn decode_reading(payload: &[u8]) -> Option<VitalsReading> {
    let reading: VitalsReading = serde_json::from_slice(payload).ok()?;
    if reading.device_id.trim().is_empty() {
        return None;
    }
    Some(reading)
}

pub fn spawn_mqtt_listener(
    conf: MqttConf,
    stores: Stores,
    policy: Arc<ClassifierPolicy>,
    window: usize,
    health: HealthTracker,
) {
    task::spawn(async move {
        let mut opts = MqttOptions::new("vitals-kernel", &conf.host, conf.port);
        opts.set_keep_alive(Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        health.mark_mqtt_connecting();

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    health.mark_mqtt_connected();
                    // (ré)abonnement à chaque connexion : la session n'est pas persistante
                    if let Err(e) = client.subscribe(READING_TOPIC, QoS::AtLeastOnce).await {
                        error!("subscribe MQTT failed: {e:?}");
                    } else {
                        info!(broker = %conf.host, topic = READING_TOPIC, "subscribed to device readings");
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(p))) if p.topic == READING_TOPIC => {
                    let Some(reading) = decode_reading(&p.payload) else {
                        warn!("reading JSON invalide: {}", String::from_utf8_lossy(&p.payload));
                        continue;
                    };
                    match ingest_reading(&stores, &policy, window, reading) {
                        Ok(outcome) => debug!(device_id = %outcome.device_id, "reading ingested via MQTT"),
                        Err(e) => error!("failed to ingest MQTT reading: {e}"),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT erreur: {:?}", e);
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}
