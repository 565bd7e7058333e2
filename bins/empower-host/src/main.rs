use empower_control::{CircuitController, Transport, TransportError};
use empower_core::keys::{channels, device_key, DeviceType};
use empower_core::n2k::N2kConfiguration;
use empower_core::path::PathPattern;
use empower_core::stream::Observer;
use empower_core::{
    ChannelStore, ConfigStorage, FileConfigStorage, MemoryChannelStore, Stream, Subscription,
    Telemetry, Ticker,
};
use empower_graph::{ConfigProcessor, GraphHost};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,empower_graph=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Empower host starting...");

    let root = std::env::args().nth(1).unwrap_or_else(|| "config".into());
    // mobile channels echoed by the demo loop, e.g. "battery.*"
    let watch = PathPattern::new(&std::env::args().nth(2).unwrap_or_else(|| "*".into()))?;

    let storage = FileConfigStorage::new(&root);
    let settings = storage.load_settings()?;
    let config = storage.load_n2k_config()?;
    let engines = storage.load_engine_config()?;

    let store: Arc<dyn ChannelStore> = Arc::new(MemoryChannelStore::new());
    let ticker = Arc::new(TokioTicker::new(Handle::current()));
    let controller = CircuitController::new(LoggingTransport, &settings.control);
    let host = Arc::new(GraphHost::new(ConfigProcessor::new(store.clone(), ticker, settings)));

    let things = host.load_config(&config)?;
    let engine_count = host.load_engines(&engines)?;
    tracing::info!("Loaded {} things and {} engines from {}", things, engine_count, root);

    if let Some(system) = host.system_json() {
        println!("{}", serde_json::to_string_pretty(&system)?);
    }

    // Exercise the control path once against the first switchable circuit
    if let Some(circuit) = config
        .circuits
        .values()
        .find(|c| c.remote_visibility.is_remote() && c.switch_type.is_controllable())
    {
        match controller.set_circuit_power(circuit, store.as_ref(), true).await {
            Ok(done) => tracing::info!("Switched circuit {} on: {}", circuit.control_id, done),
            Err(e) => tracing::warn!("Control rejected: {}", e),
        }
    }

    let demo_store = store.clone();
    let demo_handle = tokio::spawn(async move {
        generate_demo_telemetry(demo_store, config, watch).await;
    });

    tracing::info!("Empower host ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = demo_handle => {
            tracing::warn!("Demo telemetry stopped");
        }
    }

    host.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Ticks on the tokio runtime; each subscription owns one interval task.
struct TokioTicker {
    handle: Handle,
}

impl TokioTicker {
    fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Ticker for TokioTicker {
    fn every(&self, period: Duration) -> Stream<()> {
        let handle = self.handle.clone();
        Stream::new(move |observer: Observer<()>| {
            let task = handle.spawn(async move {
                let mut interval = tokio::time::interval(period);
                // the first tick completes immediately
                interval.tick().await;
                loop {
                    interval.tick().await;
                    observer(());
                }
            });
            Subscription::new(move || task.abort())
        })
    }
}

/// Logs every request and answers OK.
struct LoggingTransport;

impl Transport for LoggingTransport {
    fn send(&self, payload: String) -> impl Future<Output = Result<String, TransportError>> + Send {
        tracing::info!("control -> {}", payload);
        std::future::ready(Ok(r#"{"Result":"OK"}"#.to_string()))
    }
}

/// Simulated telemetry for every configured DC meter, GNSS receiver and
/// shore-power line.
async fn generate_demo_telemetry(
    store: Arc<dyn ChannelStore>,
    config: N2kConfiguration,
    watch: PathPattern,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut latitude = 52.0987654;
    let mut longitude = 4.9876545;
    let started = tokio::time::Instant::now();

    loop {
        interval.tick().await;
        let t = started.elapsed().as_secs_f64();

        latitude += 0.00001;
        longitude += 0.00002;

        for dc in config.dc.values() {
            let key = device_key(DeviceType::Dc, dc.instance);
            let soc = 80.0 - t / 60.0;
            store.update_channel(&key, channels::VOLTAGE, serde_json::json!(12.6 + t.sin() * 0.3));
            store.update_channel(&key, channels::CURRENT, serde_json::json!(-4.0 + t.cos()));
            store.update_channel(&key, channels::STATE_OF_CHARGE, serde_json::json!(soc));
        }
        for gnss in config.gnss.values() {
            let key = device_key(DeviceType::Gnss, gnss.instance);
            store.update_channel(&key, channels::GNSS_LATITUDE, serde_json::json!(latitude));
            store.update_channel(&key, channels::GNSS_LONGITUDE, serde_json::json!(longitude));
            store.update_channel(&key, channels::GNSS_SOG, serde_json::json!(3.85 + t.sin() * 0.5));
        }
        for meter in config.ac.values() {
            let key = device_key(DeviceType::Ac, meter.instance);
            for line in meter.lines.values() {
                let voltage = if line.line == 1 { 230.0 } else { 0.0 };
                store.push(Telemetry::new(
                    DeviceType::Ac,
                    key.clone(),
                    format!("{}.{}", channels::VOLTAGE, line.line),
                    serde_json::json!(voltage),
                ));
            }
        }

        tracing::debug!("{}: {:?}", watch.as_str(), store.mobile_matching(&watch));
    }
}
