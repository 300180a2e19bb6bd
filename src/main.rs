use clap::{Args, Parser, Subcommand};
use log::{debug, error};
use sharkline::capture::CaptureOptions;
use sharkline::client::shark_tank::DEFAULT_NAMESPACE;
use sharkline::client::{ClientRegistry, HostClientFactory};
use sharkline::configuration::{Config, GlobalArgs};
use sharkline::controller::{CaptureCommand, Controller, OutputFormat, TargetKind};
use sharkline::error_handling::types::ControllerError;

#[derive(Parser)]
#[command(name = "sharkline")]
#[command(version)]
#[command(about = "Live network packet captures from containers, pods and processes")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List capture targets, optionally only of the given kinds
    List {
        #[arg(value_enum)]
        kinds: Vec<TargetKind>,

        #[arg(short = 'o', long = "output", value_enum)]
        format: Option<OutputFormat>,

        #[arg(long)]
        no_headers: bool,
    },
    /// Capture network packets from a target and write them as pcapng
    Capture(CaptureArgs),
    /// Show the version
    Version,
}

#[derive(Args)]
struct CaptureArgs {
    #[command(subcommand)]
    kind: Option<CaptureKind>,

    /// Network interfaces to capture from; all when left out
    #[arg(short = 'i', long = "interface", global = true)]
    interfaces: Vec<String>,

    /// Packet capture filter expression
    #[arg(short = 'f', long, global = true, default_value = "")]
    filter: String,

    /// Don't put the network interfaces into promiscuous mode
    #[arg(short = 'p', long = "no-promiscuous-mode", global = true)]
    avoid_promiscuous: bool,

    /// Output file, or "-" for stdout
    #[arg(short = 'w', long, global = true, default_value = "-")]
    write: String,

    /// Name of any target; must match exactly one
    target: Option<String>,
}

#[derive(Subcommand, Clone)]
enum CaptureKind {
    /// Capture from a pod
    Pod {
        #[arg(short = 'n', long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Pod name, or namespace/name
        pod: String,
    },
    /// Capture from a stand-alone container
    Container {
        #[arg(long)]
        node: Option<String>,

        name: String,
    },
    /// Capture from a process or process-less network stack
    Network {
        #[arg(long)]
        node: Option<String>,

        name: String,
    },
}

impl CaptureArgs {
    fn command(&self) -> Result<CaptureCommand, ControllerError> {
        let (name, kind, node) = match (&self.kind, &self.target) {
            (Some(_), Some(target)) => {
                return Err(ControllerError::InvalidArgument(format!(
                    "unexpected capture target {:?} next to a target kind",
                    target
                )))
            }
            (None, None) => {
                return Err(ControllerError::InvalidArgument(
                    "missing capture target".to_string(),
                ))
            }
            (None, Some(target)) => (target.clone(), None, None),
            (Some(CaptureKind::Pod { namespace, pod }), None) => {
                let name = if pod.contains('/') {
                    pod.clone()
                } else {
                    format!("{}/{}", namespace, pod)
                };
                (name, Some(TargetKind::Pod), None)
            }
            (Some(CaptureKind::Container { node, name }), None) => {
                (name.clone(), Some(TargetKind::Container), node.clone())
            }
            (Some(CaptureKind::Network { node, name }), None) => {
                (name.clone(), Some(TargetKind::Network), node.clone())
            }
        };
        Ok(CaptureCommand {
            name,
            kind,
            node,
            options: CaptureOptions {
                nifs: self.interfaces.clone(),
                filter: self.filter.clone(),
                avoid_promiscuous_mode: self.avoid_promiscuous,
            },
            output: self.write.clone(),
        })
    }
}

async fn run(cli: Cli) -> Result<(), ControllerError> {
    let config = Config::load(&cli.global)?;
    debug!("configuration: host {:?}, timeout {}s", config.host, config.request_timeout_secs);

    let registry = ClientRegistry::new().register(Box::new(HostClientFactory));
    match cli.command {
        Command::Version => {
            println!("sharkline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::List {
            kinds,
            format,
            no_headers,
        } => {
            let controller = Controller::new(config, &registry)?;
            print!("{}", controller.list(&kinds, format, no_headers).await?);
            Ok(())
        }
        Command::Capture(args) => {
            let cmd = args.command()?;
            let controller = Controller::new(config, &registry)?;
            controller.capture(&cmd).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Packets may go to stdout, so logs stay on stderr.
    env_logger::Builder::from_default_env()
        .filter_level(if cli.global.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .format_target(false)
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
