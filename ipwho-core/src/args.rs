//! CLI argument parsing and validation
//!
//! Source selectors use multi-letter single-dash flags (`-sd`, `-aip`), so
//! arguments are parsed by hand rather than with a derive-based parser.
//! Every flag also has a long form, and `--key=value` is accepted for flags
//! that take a value.
//!
//! # Examples
//!
//! ```
//! use ipwho_core::args::IpwhoArgs;
//! use ipwho_core::types::SourceKind;
//!
//! let args = IpwhoArgs::from_iter_safe(["ipwho", "-w", "-sd", "8.8.8.8"]).unwrap();
//! assert!(args.validate().is_ok());
//! assert!(args.enabled_sources().contains(&SourceKind::Shodan));
//! ```

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{LookupRequest, SourceKind};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Usage text printed by `-h`
pub const USAGE: &str = "\
usage: ipwho [-h] [-V] [-w] [-g] [-sd] [-aip] [-n] [-a] [-v] [-o OUTPUT]
             [--timeout SECS] [--scan-timeout SECS] [--output-dir DIR]
             [--no-dns]
             ip

OSINT lookup for a single IP address

positional arguments:
  ip                     IPv4 or IPv6 address to investigate

options:
  -h, --help             show this help message and exit
  -V, --version          show version and exit
  -w, --whois            perform WHOIS lookup
  -g, --geoip            perform GeoIP lookup
  -sd, --shodan          perform Shodan lookup (needs SHODAN_API_KEY)
  -aip, --abuseipdb      perform AbuseIPDB lookup (needs ABUSEIPDB_API_KEY)
  -n, --nmap             perform Nmap scan (needs nmap installed)
  -a, --all              enable every lookup
  -v, --verbose          enable verbose logging
  -o, --output OUTPUT    also save the results to OUTPUT
  --timeout SECS         time budget for each network lookup (default 10)
  --scan-timeout SECS    time budget for the Nmap scan (default 60)
  --output-dir DIR       directory for saved results (default outputs)
  --no-dns               skip the reverse DNS lookup in the WHOIS section
";

/// Parsed command-line arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpwhoArgs {
    // ===== SOURCES =====
    /// WHOIS lookup (-w)
    pub whois: bool,
    /// GeoIP lookup (-g)
    pub geoip: bool,
    /// Shodan lookup (-sd)
    pub shodan: bool,
    /// AbuseIPDB lookup (-aip)
    pub abuseipdb: bool,
    /// Port scan (-n)
    pub nmap: bool,
    /// Every source (-a)
    pub all: bool,

    // ===== BUDGETS =====
    /// Network lookup budget in seconds (--timeout)
    pub timeout: Option<u64>,
    /// Scan budget in seconds (--scan-timeout)
    pub scan_timeout: Option<u64>,
    /// Skip the PTR lookup (--no-dns)
    pub no_dns: bool,

    // ===== OUTPUT =====
    /// Output file name (-o)
    pub output: Option<String>,
    /// Output directory (--output-dir)
    pub output_dir: Option<PathBuf>,
    /// Verbose logging (-v)
    pub verbose: bool,

    // ===== MISC =====
    /// Show help (-h)
    pub help: bool,
    /// Show version (-V)
    pub version: bool,
    /// Positional arguments
    pub targets: Vec<String>,
}

impl IpwhoArgs {
    /// Parses arguments from a command-line iterator; the first item is the
    /// program name
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown flags, missing values and
    /// malformed numbers.
    pub fn from_iter_safe<I, S>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = iter.into_iter().map(|s| s.as_ref().to_string()).collect();
        if args.is_empty() {
            return Ok(Self::default());
        }
        Self::parse_args(&args[1..])
    }

    fn parse_args(tokens: &[String]) -> Result<Self> {
        let mut args = IpwhoArgs::default();
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];

            if token.starts_with('-') && token != "-" {
                let cleaned = token.trim_start_matches('-');

                if let Some((key, value)) = token.split_once('=') {
                    let key = key.trim_start_matches('-');
                    if !Self::is_valid_arg(key) {
                        return Err(Error::InvalidInput(format!("Unknown argument: {}", key)));
                    }
                    if !Self::arg_needs_value(key) {
                        return Err(Error::InvalidInput(format!(
                            "Argument {} does not take a value",
                            key
                        )));
                    }
                    Self::set_arg_value(&mut args, key, Some(value.to_string()))?;
                    i += 1;
                    continue;
                }

                if Self::is_valid_arg(cleaned) {
                    Self::parse_single_arg(&mut args, cleaned, tokens, &mut i)?;
                    i += 1;
                    continue;
                }

                // Attached value, e.g. -oreport.txt
                if let Some(first) = cleaned.chars().next() {
                    let (flag, value) = cleaned.split_at(first.len_utf8());
                    if !value.is_empty()
                        && Self::is_valid_arg(flag)
                        && Self::arg_needs_value(flag)
                    {
                        Self::set_arg_value(&mut args, flag, Some(value.to_string()))?;
                        i += 1;
                        continue;
                    }
                }

                return Err(Error::InvalidInput(format!(
                    "Unknown argument: {}",
                    token
                )));
            } else {
                args.targets.push(token.clone());
            }

            i += 1;
        }

        Ok(args)
    }

    fn parse_single_arg(
        args: &mut IpwhoArgs,
        arg: &str,
        tokens: &[String],
        i: &mut usize,
    ) -> Result<()> {
        if !Self::arg_needs_value(arg) {
            return Self::set_arg_value(args, arg, None);
        }

        match tokens.get(*i + 1) {
            Some(next) if !next.starts_with('-') || next == "-" => {
                *i += 1;
                Self::set_arg_value(args, arg, Some(next.clone()))
            }
            _ => Err(Error::InvalidInput(format!(
                "Argument {} requires a value",
                arg
            ))),
        }
    }

    fn arg_needs_value(arg: &str) -> bool {
        matches!(
            arg,
            "o" | "output" | "timeout" | "scan-timeout" | "output-dir"
        )
    }

    fn is_valid_arg(arg: &str) -> bool {
        matches!(
            arg,
            // Sources
            "w" | "whois" | "g" | "geoip" | "sd" | "shodan" | "aip" | "abuseipdb" |
            "n" | "nmap" | "a" | "all" |
            // Budgets
            "timeout" | "scan-timeout" | "no-dns" |
            // Output
            "o" | "output" | "output-dir" | "v" | "verbose" |
            // Help/version
            "h" | "help" | "V" | "version"
        )
    }

    fn set_arg_value(args: &mut IpwhoArgs, name: &str, value: Option<String>) -> Result<()> {
        match name {
            "w" | "whois" => args.whois = true,
            "g" | "geoip" => args.geoip = true,
            "sd" | "shodan" => args.shodan = true,
            "aip" | "abuseipdb" => args.abuseipdb = true,
            "n" | "nmap" => args.nmap = true,
            "a" | "all" => args.all = true,

            "timeout" => args.timeout = value.map(|v| parse_seconds(name, &v)).transpose()?,
            "scan-timeout" => {
                args.scan_timeout = value.map(|v| parse_seconds(name, &v)).transpose()?
            }
            "no-dns" => args.no_dns = true,

            "o" | "output" => args.output = value,
            "output-dir" => args.output_dir = value.map(PathBuf::from),
            "v" | "verbose" => args.verbose = true,

            "h" | "help" => args.help = true,
            "V" | "version" => args.version = true,

            _ => {
                return Err(Error::InvalidInput(format!("Unknown argument: {}", name)));
            }
        }
        Ok(())
    }

    /// Validates the parsed arguments
    ///
    /// # Errors
    ///
    /// Returns an error unless exactly one valid IP address and at least one
    /// source were given. Help and version requests always validate.
    pub fn validate(&self) -> Result<()> {
        if self.help || self.version {
            return Ok(());
        }

        match self.targets.as_slice() {
            [] => return Err(Error::InvalidInput("No target IP address specified".to_string())),
            [target] => {
                crate::target::parse_target(target)?;
            }
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Expected one target, got {}: {}",
                    self.targets.len(),
                    self.targets.join(" ")
                )))
            }
        }

        if self.enabled_sources().is_empty() {
            let flags: Vec<&str> = SourceKind::ALL.iter().map(SourceKind::flag).collect();
            return Err(Error::InvalidInput(format!(
                "No lookups selected; use {} or -a",
                flags.join(", ")
            )));
        }

        Ok(())
    }

    /// Sources selected on the command line, in canonical order
    pub fn enabled_sources(&self) -> BTreeSet<SourceKind> {
        if self.all {
            return SourceKind::ALL.into_iter().collect();
        }
        [
            (self.whois, SourceKind::Whois),
            (self.geoip, SourceKind::GeoIp),
            (self.shodan, SourceKind::Shodan),
            (self.abuseipdb, SourceKind::AbuseIpDb),
            (self.nmap, SourceKind::Scanner),
        ]
        .into_iter()
        .filter_map(|(enabled, kind)| enabled.then_some(kind))
        .collect()
    }

    /// Builds the lookup request
    ///
    /// # Errors
    ///
    /// Returns an error if the target is missing or not an IP address.
    pub fn lookup_request(&self) -> Result<LookupRequest> {
        let target = self
            .targets
            .first()
            .ok_or_else(|| Error::InvalidInput("No target IP address specified".to_string()))?;
        LookupRequest::parse(target, self.enabled_sources())
    }

    /// Layers command-line values over `config`
    pub fn apply_to(&self, mut config: Config) -> Config {
        if let Some(secs) = self.timeout {
            config = config.with_network_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.scan_timeout {
            config = config.with_scan_timeout(Duration::from_secs(secs));
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir.clone());
        }
        if self.no_dns {
            config = config.with_hostname_resolution(false);
        }
        config
    }
}

fn parse_seconds(name: &str, value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(Error::InvalidInput(format!(
            "Invalid {} value: {} (expected a positive number of seconds)",
            name, value
        ))),
    }
}
