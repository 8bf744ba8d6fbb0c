use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;
use vitals_core::ClassifierPolicy;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct KernelConfig {
    pub bind: String,
    pub data_dir: PathBuf,
    /// Nombre de relevés récents utilisés pour reclassifier un patient
    pub status_window: usize,
    pub mqtt: Option<MqttConf>,
    pub classifier: ClassifierPolicy,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            data_dir: PathBuf::from("./data"),
            status_window: 10,
            mqtt: Some(MqttConf { host: "localhost".into(), port: 1883 }),
            classifier: ClassifierPolicy::default(),
        }
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("VITALS_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    load_config_from(Path::new(&path)).await
}

pub async fn load_config_from(path: &Path) -> KernelConfig {
    if path.exists() {
        let txt = fs::read_to_string(path).await.unwrap_or_default();
        if txt.trim().is_empty() { return KernelConfig::default(); }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            warn!("config invalide ({}): {e}", path.display());
            KernelConfig::default()
        })
    } else {
        warn!("pas de {}, usage config par défaut", path.display());
        KernelConfig::default()
    }
}

/// Clé API attendue dans l'en-tête `x-api-key`
pub fn api_key_from_env() -> Option<String> {
    std::env::var("VITALS_API_KEY").ok().filter(|k| !k.is_empty())
}
