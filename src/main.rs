use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use render_manager::config::{LogConfig, ManagerConfig, SessionConfig, DEFAULT_BINARY_PATH};
use render_manager::hosts::{load_hosts, verified_hosts};
use render_manager::manager::Manager;
use render_manager::render::{FrameRange, RenderRequest};
use render_manager::scheduler::Scheduler;
use render_manager::session::SshConnector;
use render_manager::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "render-manager")]
#[command(version)]
#[command(about = "Queue Maya batch renders onto remote hosts and track them")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the scheduler and the job dashboard
    Serve(ServeArgs),

    /// Render one frame range on one host and wait for it
    Render(RenderArgs),

    /// Check which hosts in a host list accept ssh logins
    Hosts {
        /// Host list file, one name per line
        #[arg(long, default_value = "hosts")]
        file: PathBuf,

        /// Probe connect timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,

        /// Output format
        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Shared Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct SessionArgs {
    /// Root for render logs; must be shared with the render hosts
    #[arg(long)]
    log_root: Option<PathBuf>,

    /// Seconds to wait for the renderer to report start-up
    #[arg(long, default_value = "120")]
    startup_timeout: u64,

    /// ssh connect timeout in seconds
    #[arg(long, default_value = "5")]
    connect_timeout: u64,
}

impl SessionArgs {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            startup_timeout: Duration::from_secs(self.startup_timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            ..SessionConfig::default()
        }
    }

    fn log_config(&self) -> LogConfig {
        match self.log_root {
            Some(ref root) => LogConfig::under(root),
            None => LogConfig::default(),
        }
    }
}

// =============================================================================
// Serve Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Host list file, one name per line
    #[arg(long, default_value = "hosts")]
    hosts: PathBuf,

    /// Drop hosts that do not accept an ssh login at start-up
    #[arg(long)]
    verify_hosts: bool,

    /// Default destination for copied images
    #[arg(long, default_value = "images")]
    output_dir: PathBuf,

    /// Renderer binary on the hosts
    #[arg(long, default_value = DEFAULT_BINARY_PATH)]
    binary: PathBuf,

    /// Tick interval while the dashboard is in use, in milliseconds
    #[arg(long, default_value = "100")]
    active_interval_ms: u64,

    /// Tick interval while nobody is watching, in seconds
    #[arg(long, default_value = "1800")]
    idle_interval_secs: u64,

    /// scp bandwidth limit in Kbit/s
    #[arg(long, default_value = "8912")]
    copy_limit: u32,

    /// Port for the web dashboard (optional)
    #[arg(long)]
    dashboard_port: Option<u16>,

    #[command(flatten)]
    session: SessionArgs,
}

// =============================================================================
// Render Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct RenderArgs {
    #[arg(long)]
    host: String,

    /// Maya scene file, as seen from the host
    #[arg(long)]
    scene: PathBuf,

    /// Image output directory on the host
    #[arg(long)]
    output: PathBuf,

    #[arg(long)]
    start: u32,

    #[arg(long)]
    end: u32,

    #[arg(long)]
    camera: Option<String>,

    /// Resolution override, WIDTHxHEIGHT
    #[arg(long)]
    resolution: Option<String>,

    #[arg(long, default_value = DEFAULT_BINARY_PATH)]
    binary: PathBuf,

    /// Remote user; defaults to the local user
    #[arg(long)]
    user: Option<String>,

    /// Copy the images here once the render has finished
    #[arg(long)]
    fetch_to: Option<PathBuf>,

    #[command(flatten)]
    session: SessionArgs,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct HostStatusOutput {
    host: String,
    reachable: bool,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn parse_resolution(value: &str) -> Result<(u32, u32), Box<dyn std::error::Error>> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("resolution must be WIDTHxHEIGHT, got {}", value))?;
    Ok((width.trim().parse()?, height.trim().parse()?))
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut hosts = load_hosts(&args.hosts).await?;
    let session = args.session.session_config();

    if args.verify_hosts {
        let reachable = verified_hosts(&hosts, session.connect_timeout).await;
        for host in hosts.iter().filter(|h| !reachable.contains(h)) {
            tracing::warn!(host = %host, "Dropping unreachable host");
        }
        if reachable.is_empty() {
            return Err("none of the listed hosts is reachable".into());
        }
        hosts = reachable;
    }

    let dashboard_addr: Option<SocketAddr> = match args.dashboard_port {
        Some(p) => Some(format!("0.0.0.0:{}", p).parse()?),
        None => None,
    };

    let config = ManagerConfig {
        hosts,
        output_dir: args.output_dir,
        binary_path: args.binary,
        active_interval: Duration::from_millis(args.active_interval_ms),
        idle_interval: Duration::from_secs(args.idle_interval_secs),
        copy_limit_kbit: args.copy_limit,
        dashboard_addr,
        logs: args.session.log_config(),
        session,
    };

    let token = install_shutdown_handler();
    Manager::new(config).run(token).await;
    Ok(())
}

async fn run_render(args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut request = RenderRequest::new(
        args.host.clone(),
        args.scene,
        args.output,
        FrameRange::new(args.start, args.end)?,
    )
    .with_binary(args.binary);
    if let Some(camera) = args.camera {
        request = request.with_camera(camera);
    }
    if let Some(ref resolution) = args.resolution {
        let (width, height) = parse_resolution(resolution)?;
        request = request.with_resolution(width, height);
    }
    if let Some(user) = args.user {
        request = request.with_user(user);
    }

    let config = ManagerConfig {
        session: args.session.session_config(),
        logs: args.session.log_config(),
        ..ManagerConfig::default()
    }
    .with_host(args.host);
    let connector = Arc::new(SshConnector::new(config.session.clone()));
    let scheduler = Scheduler::new(connector, &config);

    let id = scheduler.submit(request).await?;
    let token = install_shutdown_handler();
    let mut ticker = tokio::time::interval(config.active_interval);
    let mut last_line = String::new();

    let snapshot = loop {
        tokio::select! {
            _ = token.cancelled() => {
                scheduler.shutdown().await;
                return Err("interrupted".into());
            }
            _ = ticker.tick() => {}
        }
        scheduler.tick().await;

        let snapshot = scheduler.snapshot(id).await?;
        let line = format!(
            "[{}] frame {}/{} {:.2}%",
            snapshot.state, snapshot.current_frame, snapshot.total_frames, snapshot.progress
        );
        if line != last_line {
            println!("{}", line);
            last_line = line;
        }
        if snapshot.state == "Finished" || snapshot.state == "Error" {
            break snapshot;
        }
    };

    println!(
        "{}: error code {} ({})",
        snapshot.state,
        snapshot
            .error_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string()),
        snapshot.error_detail
    );

    if snapshot.state != "Finished" {
        return Err(format!("render failed, see {}", snapshot.job_log_path).into());
    }
    if let Some(dest) = args.fetch_to {
        scheduler.copy_output(id, &dest).await?;
        println!("Images copied to {}", dest.display());
    }
    Ok(())
}

async fn run_hosts(
    file: PathBuf,
    timeout: u64,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let hosts = load_hosts(&file).await?;
    let reachable = verified_hosts(&hosts, Duration::from_secs(timeout)).await;
    let statuses: Vec<HostStatusOutput> = hosts
        .into_iter()
        .map(|host| HostStatusOutput {
            reachable: reachable.contains(&host),
            host,
        })
        .collect();

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&statuses)?),
        OutputFormat::Table => {
            println!("{:<24} STATUS", "HOST");
            for status in &statuses {
                let label = if status.reachable { "up" } else { "unreachable" };
                println!("{:<24} {}", status.host, label);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging();

    match args.command {
        Commands::Serve(serve_args) => run_serve(serve_args).await?,
        Commands::Render(render_args) => run_render(render_args).await?,
        Commands::Hosts {
            file,
            timeout,
            output,
        } => run_hosts(file, timeout, output).await?,
    }

    Ok(())
}
