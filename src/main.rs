use anyhow::{Context, Result};
use asiopanel::hal::mock::{SimulatedDevice, SimulatedPropertySource};
use asiopanel::{AsioPanel, PanelConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

/// Drive the control panel core against simulated USB audio interfaces
#[derive(Parser, Debug)]
#[command(name = "asiopanel", version)]
struct Args {
    /// Panel config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Poll periods to wait after the out-of-band sample-rate change
    #[arg(long, default_value_t = 2)]
    ticks: u32,
}

async fn print_snapshot(panel: &AsioPanel) -> Result<()> {
    let snapshot = panel.snapshot().await.context("panel owner task stopped")?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PanelConfig::load(path).await?,
        None => PanelConfig::default(),
    };

    let source = Arc::new(SimulatedPropertySource::with_devices([
        SimulatedDevice::new("usb#vid_0499&pid_1703", "Steinberg UR22C")
            .with_rates(0x1f8)
            .with_sample_rate(48000)
            .with_buffer_size(256),
        SimulatedDevice::new("usb#vid_0499&pid_1509", "Yamaha AG06")
            .with_rates(0x18)
            .with_sample_rate(44100)
            .with_buffer_size(512),
        // No ASIO channels, never listed
        SimulatedDevice::new("usb#vid_046d&pid_0a44", "Headset").with_channels(0, 0),
    ]));
    source.set_designated_path("usb#vid_0499&pid_1509");

    let panel = AsioPanel::start(source.clone(), &config);

    println!("=== Load ===");
    println!("{:?}", panel.load_initial_state().await);
    print_snapshot(&panel).await?;

    println!("\n=== Hot-plug ===");
    source.plug(
        SimulatedDevice::new("usb#vid_1397&pid_0507", "Behringer UMC204HD")
            .with_rates(0x1f8)
            .with_sample_rate(96000)
            .with_buffer_size(128),
    );
    println!("{:?}", panel.device_changed().await);
    print_snapshot(&panel).await?;

    println!("\n=== Out-of-band sample rate change ===");
    source.set_external_sample_rate("usb#vid_0499&pid_1509", 48000);
    match config.poll_interval() {
        Some(period) => tokio::time::sleep(period * args.ticks + period / 2).await,
        None => println!("{:?}", panel.poll_now().await),
    }
    print_snapshot(&panel).await?;

    println!("\n=== User edit ===");
    println!("device 0: {}", panel.set_device_index(0).await);
    println!("sample rate 2: {}", panel.set_sample_rate_index(Some(2)).await);
    println!("buffer size 6: {}", panel.set_buffer_size_index(Some(6)).await);
    print_snapshot(&panel).await?;

    println!("\n=== Commit ===");
    match panel.confirm().await {
        Some(report) => {
            for write in &report.writes {
                println!("  [{}] {} {}: {:?}", write.device_index, write.path, write.property, write.result);
            }
            println!("clean: {}", report.is_clean());
        }
        None => println!("no device selected"),
    }

    println!("\n=== Hardware journal ===");
    for op in source.journal() {
        println!("  {:?}", op);
    }

    panel.dispose();
    Ok(())
}
