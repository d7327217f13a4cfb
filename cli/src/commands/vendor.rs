use anyhow::Context;
use colored::*;
use lanprobe_common::config::RunConfig;
use lanprobe_common::network::mac::{is_locally_administered, parse_mac};
use lanprobe_core::vendors::{OuiVendorResolver, RANDOMIZED_LABEL};

use crate::commands::VendorArgs;
use crate::terminal::{colors, print};

pub fn vendor(args: VendorArgs) -> anyhow::Result<()> {
    let mac = parse_mac(&args.mac).with_context(|| format!("{:?} is not a MAC address", args.mac))?;
    let oui_dir = match (&args.oui_dir, &args.config) {
        (Some(dir), _) => dir.clone(),
        (None, Some(path)) => RunConfig::from_file(path)?.merge_env()?.oui_dir,
        (None, None) => RunConfig::default().merge_env()?.oui_dir,
    };

    let resolver = OuiVendorResolver::load_dir(&oui_dir).with_builtin_fallback();
    let report = resolver.report();

    print::header("vendor lookup");
    print::aligned_line("MAC", mac.to_string().color(colors::MAC_ADDR));
    match resolver.lookup(&args.mac) {
        Some(record) => {
            print::aligned_line("Vendor", record.organization.bold().green());
            print::aligned_line("Prefix", format!("{} (/{})", record.prefix, record.prefix.bits()).normal());
            print::aligned_line("Source", record.source.to_string().normal());
        }
        None if is_locally_administered(mac) => {
            print::aligned_line("Vendor", RANDOMIZED_LABEL.yellow());
        }
        None => print::aligned_line("Vendor", "unknown".red()),
    }
    print::aligned_line(
        "Tables",
        format!("{} prefixes, {} lines skipped", report.total_added(), report.total_skipped()).dimmed(),
    );
    Ok(())
}
