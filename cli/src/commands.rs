pub mod scan;
pub mod vendor;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lanprobe", version)]
#[command(about = "Find live hosts on the LAN, fingerprint their services and guess what they are.")]
pub struct CommandLine {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sweep targets, scan live hosts and classify them
    #[command(alias = "s")]
    Scan(ScanArgs),
    /// Resolve a MAC address against the vendor tables
    #[command(alias = "v")]
    Vendor(VendorArgs),
}

#[derive(Args)]
pub struct ScanArgs {
    /// Addresses, a.b.c.d-e ranges and CIDR blocks, comma separated. Defaults to the local LAN.
    pub targets: Option<String>,

    /// TOML run configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ports to scan, e.g. 22,80,8000-8100
    #[arg(short, long)]
    pub ports: Option<String>,

    /// TCP connect timeout in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Ports probed at once per host
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Directory holding oui.csv, oui.txt, manuf or nmap-mac-prefixes
    #[arg(long)]
    pub oui_dir: Option<PathBuf>,

    /// Query port 9100 with PJL INFO ID
    #[arg(long)]
    pub pjl: bool,

    /// Print the analyses as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct VendorArgs {
    /// MAC address in any common notation
    pub mac: String,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub oui_dir: Option<PathBuf>,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        CommandLine::command().debug_assert();
    }

    #[test]
    fn scan_flags_parse() {
        let cli = CommandLine::try_parse_from([
            "lanprobe", "-v", "scan", "192.168.1.0/24", "--ports", "22,80", "--json", "--pjl",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.targets.as_deref(), Some("192.168.1.0/24"));
        assert_eq!(args.ports.as_deref(), Some("22,80"));
        assert!(args.json && args.pjl);
    }

    #[test]
    fn vendor_alias() {
        let cli = CommandLine::try_parse_from(["lanprobe", "v", "00:1b:63:aa:bb:cc"]).unwrap();
        assert!(matches!(cli.command, Commands::Vendor(ref a) if a.mac == "00:1b:63:aa:bb:cc"));
    }
}
