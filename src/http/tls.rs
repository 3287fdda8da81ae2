use tokio_native_tls::TlsConnector;
use tokio_native_tls::native_tls::{self, Protocol, TlsConnectorBuilder};
use tracing::warn;

use crate::config::{TlsConfig, TlsVersion};

/// Certificate trust applied to a job's client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsPolicy {
    /// No `tls_config` given: accept any certificate and hostname.
    SkipVerify,
    /// Caller-supplied `tls_config`, used as-is.
    Configured(TlsConfig),
}

impl TlsPolicy {
    #[must_use]
    pub fn from_config(config: Option<TlsConfig>) -> Self {
        config.map_or(TlsPolicy::SkipVerify, TlsPolicy::Configured)
    }

    #[must_use]
    pub const fn verifies_certificates(&self) -> bool {
        match self {
            TlsPolicy::SkipVerify => false,
            TlsPolicy::Configured(config) => !config.insecure_skip_verify,
        }
    }
}

/// Builds the connector used for https origins. `None` when the platform
/// TLS library rejects the settings; https dispatches then fail.
pub(super) fn build_tls_connector(policy: &TlsPolicy, debug: bool) -> Option<TlsConnector> {
    match connector_builder(policy, debug).build() {
        Ok(connector) => Some(TlsConnector::from(connector)),
        Err(err) => {
            if debug {
                warn!("Failed to build TLS connector, https targets will fail: {}", err);
            }
            None
        }
    }
}

fn connector_builder(policy: &TlsPolicy, debug: bool) -> TlsConnectorBuilder {
    let mut builder = native_tls::TlsConnector::builder();
    if !policy.verifies_certificates() {
        builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    let TlsPolicy::Configured(config) = policy else {
        return builder;
    };
    if let (Some(min), Some(max)) = (config.min_version, config.max_version)
        && min > max
    {
        if debug {
            warn!(
                "Ignoring TLS version bounds, min {:?} is above max {:?}",
                min, max
            );
        }
        return builder;
    }
    if let Some(min) = config.min_version {
        builder.min_protocol_version(Some(to_protocol(min)));
    }
    if let Some(max) = config.max_version {
        builder.max_protocol_version(Some(to_protocol(max)));
    }
    builder
}

const fn to_protocol(version: TlsVersion) -> Protocol {
    match version {
        TlsVersion::V1_0 => Protocol::Tlsv10,
        TlsVersion::V1_1 => Protocol::Tlsv11,
        TlsVersion::V1_2 => Protocol::Tlsv12,
        TlsVersion::V1_3 => Protocol::Tlsv13,
    }
}
