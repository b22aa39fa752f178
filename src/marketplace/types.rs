//! Raw records emitted by `vastai ... --raw`.

use serde::Deserialize;

use crate::backend::InstanceStatus;
use crate::offer::Offer;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(super) struct RawOffer {
    pub(super) id: u64,
    #[serde(default)]
    pub(super) cpu_name: Option<String>,
    #[serde(default)]
    pub(super) cpu_cores_effective: Option<f64>,
    #[serde(default)]
    pub(super) cpu_cores: Option<u32>,
    #[serde(default)]
    pub(super) cpu_ram: Option<f64>,
    #[serde(default)]
    pub(super) dph_base: Option<f64>,
    pub(super) dph_total: f64,
    #[serde(default)]
    pub(super) inet_down: Option<f64>,
    #[serde(default)]
    pub(super) cuda_max_good: Option<f64>,
}

impl From<RawOffer> for Offer {
    fn from(raw: RawOffer) -> Self {
        Self {
            id: raw.id,
            cpu_name: raw.cpu_name.unwrap_or_default(),
            cpu_cores_effective: raw.cpu_cores_effective.unwrap_or_default(),
            cpu_cores_total: raw.cpu_cores.unwrap_or_default(),
            ram_mb: raw.cpu_ram.unwrap_or_default(),
            hourly_price_base: raw.dph_base.unwrap_or(raw.dph_total),
            hourly_price_total: raw.dph_total,
            download_mbps: raw.inet_down.unwrap_or_default(),
            max_cuda_version: raw.cuda_max_good.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub(super) struct RawInstance {
    pub(super) id: u64,
    #[serde(default)]
    pub(super) actual_status: Option<String>,
    #[serde(default)]
    pub(super) ssh_host: Option<String>,
    #[serde(default)]
    pub(super) ssh_port: Option<u16>,
}

impl From<RawInstance> for InstanceStatus {
    fn from(raw: RawInstance) -> Self {
        Self {
            instance_id: raw.id,
            actual_status: raw.actual_status,
            ssh_host: raw.ssh_host,
            ssh_port: raw.ssh_port,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub(super) struct RawCreateResponse {
    pub(super) success: bool,
    #[serde(default)]
    pub(super) new_contract: Option<u64>,
}
