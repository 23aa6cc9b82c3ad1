use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use huidu_sdk::{ClientConfig, Device, TimeInfo, UploadProgress};

#[derive(Parser, Debug)]
#[command(name = "huidu-ctl", about = "Control Huidu LED controllers over the network")]
struct Args {
    /// Controller address
    #[arg(long, default_value = "192.168.6.1")]
    host: String,

    /// TCP port
    #[arg(long, default_value_t = 10001)]
    port: u16,

    /// Read/write deadline in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Heartbeat interval in seconds
    #[arg(long, default_value_t = 30)]
    heartbeat: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the device descriptor
    Info,
    /// Show the wired network settings
    Eth,
    /// Show the device clock settings
    Time,
    /// Set the device clock to this machine's local time
    SyncTime {
        /// Timezone label sent with the time
        #[arg(long, default_value = "(UTC+08:00)Beijing,Chongqing,HongKong,Urumchi")]
        timezone: String,
    },
    /// Show the brightness policy, or set a fixed brightness in percent
    Brightness {
        #[arg(value_parser = clap::value_parser!(u32).range(1..=100))]
        percent: Option<u32>,
    },
    /// Show the wireless module settings
    Wifi,
    /// Show the scheduled screen on/off windows
    Schedule,
    /// Turn the screen on or off
    Screen {
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    /// List files stored on the device
    Files,
    /// Delete files from the device
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Remove every program from the screen
    ClearPrograms,
    /// Upload files, resuming partial uploads
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Send an SDK method with an optional inner XML body
    Raw {
        method: String,
        #[arg(default_value = "")]
        inner: String,
    },
    /// Search the local network for controllers
    Scan {
        /// Seconds to wait for answers
        #[arg(long, default_value_t = 3)]
        wait: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.parse().unwrap_or_default()),
        )
        .init();

    if let Command::Scan { wait } = args.command {
        let found = huidu_sdk::scan(Duration::from_secs(wait)).await?;
        if found.is_empty() {
            println!("no devices answered");
        }
        for dev in found {
            println!("{}\t{}", dev.addr.ip(), dev.device_id);
        }
        return Ok(());
    }

    let config = ClientConfig::new(args.host.clone())
        .with_port(args.port)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_heartbeat_interval(Duration::from_secs(args.heartbeat));
    let device = Device::new(config);
    device
        .connect()
        .await
        .with_context(|| format!("connecting to {}:{}", args.host, args.port))?;

    let result = run(&device, args.command).await;
    device.close().await;
    result
}

async fn run(device: &Device, command: Command) -> Result<()> {
    match command {
        Command::Info => {
            let info = device.device_info().await?;
            println!("model:    {}", info.model);
            println!("id:       {}", info.device_id);
            println!("name:     {}", info.device_name);
            println!("cpu:      {}", info.cpu);
            println!("app:      {}", info.app_version);
            println!("fpga:     {}", info.fpga_version);
            println!("kernel:   {}", info.kernel_version);
            println!(
                "screen:   {}x{} (rotation {})",
                info.screen_width, info.screen_height, info.screen_rotation
            );
        }
        Command::Eth => {
            let eth = device.ethernet_info().await?;
            println!("enabled:  {}", eth.enabled);
            println!("dhcp:     {}", eth.auto_dhcp);
            println!("ip:       {}", eth.ip);
            println!("netmask:  {}", eth.netmask);
            println!("gateway:  {}", eth.gateway);
            println!("dns:      {}", eth.dns);
        }
        Command::Time => {
            let time = device.time_info().await?;
            println!("time:     {}", time.time);
            println!("timezone: {}", time.timezone);
            println!("sync:     {}", time.sync);
            println!("summer:   {}", time.summer);
        }
        Command::SyncTime { timezone } => {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            device
                .set_time_info(&TimeInfo {
                    timezone,
                    summer: false,
                    sync: "none".to_string(),
                    time: now,
                })
                .await
                .context("setting device time")?;
        }
        Command::Brightness { percent: Some(percent) } => {
            device
                .set_brightness(percent)
                .await
                .context("setting brightness")?;
        }
        Command::Brightness { percent: None } => {
            let lum = device.luminance_info().await?;
            println!("mode:     {}", lum.mode.as_str());
            println!("default:  {}%", lum.default_value);
            for item in &lum.items {
                println!("  {} {}% (enabled {})", item.start, item.percent, item.enabled);
            }
            println!(
                "sensor:   {}-{}% every {}s",
                lum.sensor_min, lum.sensor_max, lum.sensor_time
            );
        }
        Command::Wifi => {
            let wifi = device.wifi_info().await?;
            if !wifi.has_wifi {
                println!("no wifi module");
                return Ok(());
            }
            println!("enabled:  {}", wifi.enabled);
            println!("mode:     {}", wifi.mode.as_str());
            println!("ap ssid:  {} (channel {})", wifi.ap.ssid, wifi.ap.channel);
            println!("station:  {}", wifi.station_ssid);
        }
        Command::Schedule => {
            let schedule = device.switch_time_info().await?;
            println!("open:     {}", schedule.open_enabled);
            println!("schedule: {}", schedule.ploy_enabled);
            for item in &schedule.items {
                println!("  {}-{} on={}", item.start, item.end, item.enabled);
            }
        }
        Command::ClearPrograms => device.delete_all_programs().await?,
        Command::Screen { state } => {
            if state == "on" {
                device.open_screen().await?;
            } else {
                device.close_screen().await?;
            }
            info!("Screen {}", state);
        }
        Command::Files => {
            for file in device.file_list().await? {
                println!("{}\t{}\t{}\t{}", file.name, file.size, file.file_type, file.md5);
            }
        }
        Command::Delete { names } => {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            device.delete_files(&names).await?;
        }
        Command::Upload { paths } => {
            let mut last_logged = 0u64;
            let mut log_progress = |p: UploadProgress| {
                // One line per ~10%.
                let step = (p.percent / 10.0) as u64;
                if step != last_logged || p.sent_bytes == p.total_bytes {
                    last_logged = step;
                    info!(
                        "{}: {}/{} bytes ({:.1}%)",
                        p.file_name, p.sent_bytes, p.total_bytes, p.percent
                    );
                }
            };
            for path in &paths {
                let report = device
                    .upload_file(path, None, Some(&mut log_progress))
                    .await
                    .with_context(|| format!("uploading {}", path.display()))?;
                println!(
                    "{}\t{} bytes\t{}\tresumed from {}",
                    report.file_name, report.size, report.md5, report.resumed_from
                );
            }
        }
        Command::Raw { method, inner } => {
            let resp = device.send_command(&method, &inner).await?;
            println!("{}", resp.raw_xml);
        }
        Command::Scan { .. } => {}
    }
    Ok(())
}
