pub mod backend;
pub mod config;
pub mod core;
pub mod error;
pub mod services;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use crate::backend::sysinfo_nic::SysinfoNic;
use crate::backend::NoopTrafficEngine;
use crate::core::{Port, PortRegistry};

pub use error::PortError;

/// Process entry point: monitor every host interface as a managed port.
pub fn run() -> anyhow::Result<()> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in portgen: {info}");
        default_hook(info);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config::DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve())
}

async fn serve() -> anyhow::Result<()> {
    let nic = Arc::new(SysinfoNic::discover());
    let engine = Arc::new(NoopTrafficEngine);
    let registry = Arc::new(PortRegistry::new());

    for (idx, name) in nic.interfaces().iter().enumerate() {
        let port_id = u8::try_from(idx)?;
        let port = registry.insert(Port::new(
            port_id,
            Arc::new(AtomicUsize::new(0)),
            nic.clone(),
            engine.clone(),
        ));
        let props = port.get_properties();
        tracing::info!(
            "Port {port_id} -> {name} (driver {}, speed {}, state {})",
            props.driver,
            props.speed,
            port.get_state_as_string()
        );
    }

    if registry.is_empty() {
        tracing::warn!("No network interfaces found; nothing to monitor");
        return Ok(());
    }

    let services = services::BackgroundServices::start(&registry)?;
    tracing::info!("portgen monitoring {} ports; Ctrl-C to exit", registry.len());

    tokio::signal::ctrl_c().await?;
    services.stop();
    tracing::info!("Final stats: {}", registry.encode_all());
    Ok(())
}
