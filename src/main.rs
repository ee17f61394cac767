use clap::{Parser, Subcommand};
use rtadv::capture::RawIcmpv6SocketFactory;
use rtadv::config::{self, RtadvConfig};
use rtadv::protocol::ndp::RouterAdvertisement;
use rtadv::protocol::MacAddr;
use rtadv::rtadv::{InterfaceInfo, LinkType, RtadvSocketManager};
use rtadv::telemetry::{init_logging, RtadvMetrics};
use std::cell::RefCell;
use std::ffi::CString;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "rtadv")]
#[command(about = "IPv6 Router Advertisement client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Solicit routers on an interface and print what answers
    Solicit {
        /// Interface name
        interface: String,

        /// Path to rtadv.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seconds to keep listening after the last solicitation
        #[arg(short, long, default_value_t = 4)]
        wait: u64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write rtadv.lock with every default filled in
    Generate {
        /// Path to rtadv.toml
        #[arg(short, long, default_value = "rtadv.toml")]
        config: PathBuf,

        /// Output path for rtadv.lock
        #[arg(short, long, default_value = "rtadv.lock")]
        output: PathBuf,
    },
    /// Validate rtadv.toml
    Validate {
        /// Path to rtadv.toml
        #[arg(short, long, default_value = "rtadv.toml")]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { action } => {
            init_logging(None);
            match action {
                ConfigAction::Generate { config, output } => cmd_config_generate(&config, &output),
                ConfigAction::Validate { config } => cmd_config_validate(&config),
            }
        }
        Commands::Solicit {
            interface,
            config,
            wait,
        } => cmd_solicit(&interface, config.as_ref(), Duration::from_secs(wait)),
    };

    if let Err(e) = result {
        eprintln!("[ERROR] {}", e);
        std::process::exit(1);
    }
}

fn load_validated(config_path: &PathBuf) -> Result<RtadvConfig, String> {
    let cfg = config::load(config_path).map_err(|e| format!("Failed to parse config: {}", e))?;

    let validation = config::validate(&cfg);
    validation.log_diagnostics();
    if validation.has_errors() {
        return Err("Validation failed with errors".to_string());
    }
    Ok(cfg)
}

fn cmd_config_generate(config_path: &PathBuf, output_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Loading {}...", config_path.display());
    let cfg = load_validated(config_path)?;

    let lock = config::generate_lock(&cfg).map_err(|e| format!("Failed to serialize lock: {}", e))?;
    let output = format!(
        "# Generated by rtadv - DO NOT EDIT\n# Source: {}\n\n{}",
        config_path.display(),
        lock
    );
    std::fs::write(output_path, output).map_err(|e| format!("Failed to write lock file: {}", e))?;

    println!("[INFO] Generated {}", output_path.display());
    Ok(())
}

fn cmd_config_validate(config_path: &PathBuf) -> Result<(), String> {
    println!("[INFO] Validating {}...", config_path.display());
    load_validated(config_path)?;
    println!("[INFO] Configuration is valid");
    Ok(())
}

fn cmd_solicit(ifname: &str, config_path: Option<&PathBuf>, wait: Duration) -> Result<(), String> {
    use tokio::io::unix::AsyncFd;
    use tokio::runtime::Builder;

    let cfg = match config_path {
        Some(path) => load_validated(path)?,
        None => RtadvConfig::default(),
    };
    init_logging(Some(&cfg.logging));

    let interface = lookup_interface(ifname)?;
    info!(interface = %ifname, index = interface.index, "soliciting routers");

    let metrics = Arc::new(RtadvMetrics::new());
    let mut sockets = RtadvSocketManager::new(
        Box::new(RawIcmpv6SocketFactory),
        cfg.socket.close_delay(),
        metrics.clone(),
    );
    let handle = sockets
        .create(&interface)
        .map_err(|e| format!("Failed to register {}: {}", ifname, e))?;

    let received: Rc<RefCell<Vec<Arc<RouterAdvertisement>>>> = Rc::default();
    let sink = received.clone();
    sockets
        .enable_receive(&handle, Box::new(move |ra| sink.borrow_mut().push(ra)))
        .map_err(|e| format!("Failed to open ICMPv6 socket: {}. Run with root privileges.", e))?;
    let fd = sockets
        .raw_fd()
        .ok_or_else(|| "ICMPv6 socket has no descriptor".to_string())?;

    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to create runtime: {}", e))?;

    rt.block_on(async {
        let async_fd = AsyncFd::new(fd).map_err(|e| format!("Failed to poll socket: {}", e))?;
        let solicitation = &cfg.solicitation;

        for attempt in 1..=solicitation.max_solicitations {
            if let Err(e) = sockets.send_solicitation(&handle, interface.solicitation_lladdr().is_some()) {
                warn!(interface = %ifname, attempt, error = %e, "Router Solicitation failed");
            }

            let listen = if attempt == solicitation.max_solicitations {
                wait
            } else {
                solicitation.interval()
            };
            let deadline = tokio::time::Instant::now() + listen;

            loop {
                tokio::select! {
                    guard = async_fd.readable() => {
                        let mut guard = guard.map_err(|e| format!("Receive error: {}", e))?;
                        guard.clear_ready();
                        sockets.handle_readable(Instant::now());
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                }
                if !received.borrow().is_empty() {
                    break;
                }
            }
            if !received.borrow().is_empty() {
                break;
            }
        }
        Ok::<(), String>(())
    })?;

    sockets.release(handle, Instant::now());
    debug!(counters = ?metrics.export(), "socket counters");

    let received = received.borrow();
    if received.is_empty() {
        return Err(format!("No Router Advertisement received on {}", ifname));
    }
    for ra in received.iter() {
        print_router_advertisement(ra);
    }
    Ok(())
}

fn lookup_interface(ifname: &str) -> Result<InterfaceInfo, String> {
    let c_name = CString::new(ifname).map_err(|_| format!("Invalid interface name: {}", ifname))?;
    // SAFETY: c_name is a valid NUL-terminated string
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(rtadv::Error::InterfaceNotFound {
            name: ifname.to_string(),
        }
        .to_string());
    }

    let link_type = if ifname == "lo" {
        LinkType::Loopback
    } else if std::path::Path::new(&format!("/sys/class/net/{}/wireless", ifname)).exists() {
        LinkType::Wifi
    } else {
        LinkType::Ethernet
    };

    let mut info = InterfaceInfo::new(index, ifname, link_type);
    if let Some(mac) = get_interface_mac(ifname) {
        info = info.with_hw_addr(mac);
    }
    Ok(info)
}

fn get_interface_mac(name: &str) -> Option<MacAddr> {
    // Read MAC from /sys/class/net/{name}/address
    let path = format!("/sys/class/net/{}/address", name);
    let content = std::fs::read_to_string(path).ok()?;
    content.trim().parse().ok()
}

fn print_router_advertisement(ra: &RouterAdvertisement) {
    let flags = ra.flags();
    let now = Instant::now();
    println!("Router Advertisement from {}", ra.source());
    println!("  Router lifetime : {}s", ra.router_lifetime());
    println!(
        "  Flags           : M={} O={} H={} Prf={:?}",
        flags.managed as u8, flags.other as u8, flags.home_agent as u8, flags.preference
    );
    if let Some(mac) = ra.source_link_addr() {
        println!("  Router MAC      : {}", mac);
    }
    if let Some(mtu) = ra.mtu() {
        println!("  MTU             : {}", mtu);
    }
    for p in ra.prefixes() {
        println!(
            "  Prefix          : {} (L={} A={} valid {}s preferred {}s)",
            p.prefix, p.on_link as u8, p.autonomous as u8, p.valid_lifetime, p.preferred_lifetime
        );
    }
    for server in ra.dns_servers(now) {
        println!("  DNS server      : {}", server);
    }
    for domain in ra.dns_domains(now) {
        println!("  DNS domain      : {}", domain);
    }
    if let Some(pref64) = ra.active_pref64(now) {
        println!("  NAT64 prefix    : {} ({}s)", pref64.prefix, pref64.lifetime);
    }
    if let Some(pvd) = ra.pvd() {
        println!(
            "  PvD             : {} seq {} (H={})",
            pvd.id, pvd.sequence, pvd.http as u8
        );
    }
}
