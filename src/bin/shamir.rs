use std::error::Error;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{crate_version, Parser, Subcommand};
use rand::rngs::OsRng;
use serde_json::json;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use shamir::config::{ShamirConfig, ShareFormat};
use shamir::encoding::{marshal_text, TEXT_PREFIX};
use shamir::format::{self, ShareHeader};
use shamir::gf256;
use shamir::operations::{self, OperationContext, OperationError};
use shamir::sss::{combine_shares, Share};
use shamir::verify::{ErrorCode, ShareSet, VerificationError};

#[derive(Debug, Parser)]
#[command(name = "shamir")]
#[command(version = crate_version!())]
#[command(
    about = "Shamir secret sharing over GF(256)",
    long_about = "Splits a secret read from standard input into N shares, any K of which recover it, and combines shares read from standard input back into the secret. Shares are written one per line, either as `shamir1:` text or as hex-encoded SHAM containers that also record the threshold and share count. Settings are read from ~/.shamir/conf.toml (or --config) and SHAMIR_* environment variables; flags take precedence."
)]
struct Opt {
    /// Configuration file to use instead of ~/.shamir/conf.toml.
    #[clap(long, short, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[clap(subcommand)]
    argument: CliArgument,
}

#[derive(Debug, Subcommand)]
enum CliArgument {
    /// Split the secret on standard input into shares, one per output line.
    Split {
        /// Share threshold.
        #[clap(short = 'k', long = "threshold")]
        threshold: usize,

        /// Number of shares to generate.
        #[clap(short = 'n', long = "shares")]
        shares: usize,

        /// Encoding of the share lines.
        #[clap(long, value_enum)]
        format: Option<ShareFormat>,

        /// Session identifier for the logs. A random one is generated if omitted.
        #[clap(long)]
        session: Option<String>,

        /// Validate the parameters without splitting anything.
        #[clap(long)]
        dry_run: bool,
    },
    /// Combine share lines from standard input and write the secret to standard output.
    Combine {
        /// Refuse to combine unless the shares pass verification against the threshold.
        #[clap(long, requires = "threshold")]
        verify: bool,

        /// Share threshold, used with --verify.
        #[clap(short = 'k', long = "threshold")]
        threshold: Option<usize>,
    },
    /// Check share lines from standard input against a threshold.
    Verify {
        /// Share threshold.
        #[clap(short = 'k', long = "threshold")]
        threshold: usize,

        /// Print the report as JSON.
        #[clap(long)]
        json: bool,
    },
    /// Print the effective configuration.
    Config,
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();

    gf256::init();

    let opt = Opt::parse();
    match run(opt) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(opt: Opt) -> Result<ExitCode, Box<dyn Error>> {
    let config = ShamirConfig::load(opt.config.as_deref())?;
    debug!("Using config: {:?}", config.format);

    match opt.argument {
        CliArgument::Split {
            threshold,
            shares,
            format: share_format,
            session,
            dry_run,
        } => {
            let share_format = share_format.unwrap_or(config.format);
            let mac_key = config.mac_key_bytes()?;

            let session = session.unwrap_or_else(|| operations::new_session_id(&mut OsRng));
            let context = OperationContext::new(session, threshold, shares).with_dry_run(dry_run);
            let init = operations::initialize(&context);
            if !init.success {
                eprintln!("error: {init}");
                return Ok(ExitCode::FAILURE);
            }

            let mut secret = Vec::new();
            io::stdin().read_to_end(&mut secret)?;

            let (result, split) = operations::split(&secret, &context, &mut OsRng);
            let split = match split {
                Some(split) => split,
                None if result.error_code == Some(OperationError::DryRunActive) => {
                    eprintln!("{result}");
                    return Ok(ExitCode::SUCCESS);
                }
                None => {
                    eprintln!("error: {result}");
                    return Ok(ExitCode::FAILURE);
                }
            };
            let threshold = u8::try_from(threshold)?;
            let count = u8::try_from(shares)?;

            let mut out = io::stdout().lock();
            for share in &split {
                let line = match share_format {
                    ShareFormat::Text => marshal_text(share)?,
                    ShareFormat::Container => hex::encode(format::encode_share(
                        share,
                        threshold,
                        count,
                        mac_key.as_deref(),
                    )?),
                };
                writeln!(out, "{line}")?;
            }
            out.flush()?;
            debug!("✂️  Wrote {} shares", split.len());
        }

        CliArgument::Combine { verify, threshold } => {
            let mac_key = config.mac_key_bytes()?;
            let mut decoded = Vec::new();
            for line in read_lines()? {
                decoded.push(parse_line(&line, mac_key.as_deref())?);
            }
            let set = ShareSet::from_decoded(decoded);
            debug!("Combining {} shares", set.len());

            let secret = if verify {
                let threshold = threshold.ok_or("--verify requires --threshold")?;
                let total = set.recorded_share_count().unwrap_or(set.len());
                let context =
                    OperationContext::new(operations::new_session_id(&mut OsRng), threshold, total);

                let init = operations::initialize(&context);
                if !init.success {
                    eprintln!("error: {init}");
                    return Ok(ExitCode::FAILURE);
                }
                match operations::reconstruct(&set, &context) {
                    (_, Some(secret)) => secret,
                    (result, None) => {
                        eprintln!("error: {result}");
                        return Ok(ExitCode::FAILURE);
                    }
                }
            } else {
                combine_shares(set.shares())?
            };

            let mut out = io::stdout().lock();
            out.write_all(&secret)?;
            out.flush()?;
        }

        CliArgument::Verify { threshold, json } => {
            let mac_key = config.mac_key_bytes()?;
            let mut decoded = Vec::new();
            let mut rejected: Vec<VerificationError> = Vec::new();

            for (number, line) in read_lines()?.into_iter().enumerate() {
                match parse_line(&line, mac_key.as_deref()) {
                    Ok(parsed) => decoded.push(parsed),
                    Err(e) => {
                        warn!("Rejected share line {}: {}", number + 1, e);
                        rejected.push(VerificationError {
                            code: ErrorCode::InvalidShareFormat,
                            message: "share line could not be decoded".to_string(),
                            context: [
                                ("line".to_string(), json!(number + 1)),
                                ("reason".to_string(), json!(e.to_string())),
                            ]
                            .into_iter()
                            .collect(),
                        });
                    }
                }
            }

            let mut report = ShareSet::from_decoded(decoded).verify(threshold);
            report.invalid_shares_count += rejected.len();
            report.errors.extend(rejected);

            if json || config.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.is_success() {
                println!("Verification successful");
            } else {
                println!("Verification failed");
                for err in &report.errors {
                    println!("- {err}");
                }
            }
            if !json && !config.json {
                for warning in &report.warnings {
                    println!("warning: {warning}");
                }
            }

            if !report.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }

        CliArgument::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Reads non-blank, trimmed lines from standard input until end of input.
fn read_lines() -> io::Result<Vec<String>> {
    let mut lines = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Decodes a share line, telling text lines and hex containers apart by the text prefix.
fn parse_line(
    line: &str,
    mac_key: Option<&[u8]>,
) -> Result<(Option<ShareHeader>, Share), shamir::EncodingError> {
    if line.starts_with(TEXT_PREFIX) {
        return Ok((None, line.parse()?));
    }
    let bytes = hex::decode(line)?;
    let (header, share) = format::decode_share(&bytes, mac_key)?;
    Ok((Some(header), share))
}
