use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use sdmc_discovery::{discover, DiscoverOptions, DiscoveryError};
use smb1::{Client, ClientConfig};

mod format;

/// Browse and transfer files on a 3DS microSD card over Wi-Fi.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Console IP address. Skips discovery when given.
    #[arg(long)]
    ip: Option<Ipv4Addr>,

    /// Console NetBIOS name. With --ip but no name, the generic
    /// *SMBSERVER called name is used.
    #[arg(long)]
    name: Option<String>,

    /// Discovery cache file. Omit to always probe the network.
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Network timeout, in seconds.
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate the console and print its address and name.
    Discover,
    /// List a directory.
    Ls {
        #[arg(default_value = "\\")]
        path: String,
    },
    /// Download a file.
    Get {
        remote: String,
        local: PathBuf,
    },
    /// Upload a file.
    Put {
        local: PathBuf,
        remote: String,
    },
    /// Delete a file.
    Rm { path: String },
    /// Rename a file or directory.
    Mv { old: String, new: String },
    /// Create a directory.
    Mkdir { path: String },
    /// Remove an empty directory.
    Rmdir { path: String },
    /// Show card capacity.
    Df,
    /// Ping the server.
    Echo,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (ip, name) = resolve_target(&cli).await?;

    if matches!(cli.command, Commands::Discover) {
        println!("{ip}\t{name}");
        return Ok(());
    }

    let config = ClientConfig {
        timeout: Duration::from_secs(cli.timeout),
        ..ClientConfig::default()
    };
    let mut client = Client::with_config(ip, &name, config);
    client.connect().await?;

    let result = dispatch(&cli.command, &mut client).await;
    client.close().await;
    result
}

async fn dispatch(
    command: &Commands,
    client: &mut Client,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Discover => unreachable!("handled before connecting"),
        Commands::Ls { path } => {
            let mut entries = client.listdir(path).await?;
            entries.sort_by_key(|e| (!e.is_dir, e.name.to_lowercase()));
            for entry in entries {
                println!(
                    "{}  {:>10}  {}",
                    if entry.is_dir { "d" } else { "-" },
                    format::size(entry.size),
                    entry.name
                );
            }
        }
        Commands::Get { remote, local } => {
            let mut sink = tokio::fs::File::create(local).await?;
            let bytes = client.get_file(remote, &mut sink).await?;
            println!("{remote} -> {} ({})", local.display(), format::size(bytes));
        }
        Commands::Put { local, remote } => {
            let mut source = tokio::fs::File::open(local).await?;
            let bytes = client.put_file(remote, &mut source).await?;
            println!("{} -> {remote} ({})", local.display(), format::size(bytes));
        }
        Commands::Rm { path } => client.delete(path).await?,
        Commands::Mv { old, new } => client.rename(old, new).await?,
        Commands::Mkdir { path } => client.mkdir(path).await?,
        Commands::Rmdir { path } => client.rmdir(path).await?,
        Commands::Df => {
            let info = client.disk_info().await?;
            println!(
                "total {}  used {}  free {}",
                format::size(info.total_bytes),
                format::size(info.used_bytes),
                format::size(info.free_bytes)
            );
        }
        Commands::Echo => {
            client.echo().await?;
            println!("server is alive");
        }
    }
    Ok(())
}

/// Figures out which console to talk to: explicit flags first, then
/// discovery, then (if discovery found an address but no name) a prompt.
async fn resolve_target(cli: &Cli) -> Result<(Ipv4Addr, String), Box<dyn std::error::Error>> {
    if let Some(ip) = cli.ip {
        let name = cli.name.clone().unwrap_or_else(|| "*SMBSERVER".to_string());
        return Ok((ip, name));
    }

    let options = DiscoverOptions {
        cache_path: cli.cache.clone(),
        ..DiscoverOptions::default()
    };
    match discover(&options).await {
        Ok(found) => Ok((found.ip, found.name)),
        Err(DiscoveryError::NeedsUserInput { ip: Some(ip) }) => {
            let name = prompt("console name (shown in System Settings)")?;
            Ok((ip, name))
        }
        Err(DiscoveryError::NeedsUserInput { ip: None }) => {
            let ip = prompt("console IP address")?.parse()?;
            let name = prompt("console name (shown in System Settings)")?;
            Ok((ip, name))
        }
        Err(e) => Err(e.into()),
    }
}

fn prompt(what: &str) -> Result<String, std::io::Error> {
    use std::io::Write;
    eprint!("{what}: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
