//! srtwatch — supervise an SRT receiver session or analyze a capture.
//!
//! - `run` starts a receiver session, drives the cancellable countdown,
//!   and prints the session summary and transport-stream report
//! - `capture` processes a packet capture with the traffic-stats tool
//! - `inspect` probes the captured transport stream on demand
//! - `interfaces` lists host interfaces usable for binding or netem

mod display;
mod interfaces;
mod settings;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use srtwatch_common::artifacts::SessionArtifacts;
use srtwatch_common::config::{HandshakeMode, ReceiverVersion, SessionConfig};
use srtwatch_common::stats::{self, SessionSummary};
use srtwatch_supervisor::capture::{CaptureAnalyzer, RESULTS_FILE};
use srtwatch_supervisor::countdown;
use srtwatch_supervisor::inspect::{ProbePrograms, TransportStreamInspector};
use srtwatch_supervisor::supervisor::SessionSupervisor;

use crate::display::TerminalDisplay;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "srtwatch", about = "SRT receiver session supervisor and analysis toolkit")]
struct Cli {
    /// Optional TOML settings file (working directories, external tools).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: CommandKind,
}

#[derive(Subcommand, Debug)]
enum CommandKind {
    /// Start a receiver session and run the countdown.
    Run(RunArgs),
    /// Process a packet capture with the traffic-stats analyzer.
    Capture {
        /// The pcap file to analyze.
        pcap: PathBuf,
    },
    /// Probe the captured transport stream.
    Inspect,
    /// List host interfaces with an IPv4 address.
    Interfaces,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Receiver version tag (1.5.3, 1.5.0, 1.4.4).
    #[arg(long, default_value = "1.5.3")]
    version: String,

    /// Handshake role: listener waits for the peer, caller initiates.
    #[arg(long, default_value = "listener")]
    mode: String,

    /// Bind address (listener) or the peer's address (caller).
    #[arg(long)]
    address: String,

    /// Port for the session (9000-9100).
    #[arg(long, default_value_t = 9000)]
    port: u16,

    /// Session timeout in seconds (30-600). A timeout is required so the
    /// receiver process cannot run indefinitely.
    #[arg(long, default_value_t = 60)]
    timeout: u32,

    /// Host interface to attach network emulation to.
    #[arg(long)]
    interface: Option<String>,

    /// Artificial delay in milliseconds (10-200).
    #[arg(long, requires = "interface")]
    netem_delay: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = settings::load(cli.settings.as_deref())?;

    match cli.command {
        CommandKind::Run(args) => run_session(args, settings).await,
        CommandKind::Capture { pcap } => run_capture(&pcap, settings).await,
        CommandKind::Inspect => run_inspect(settings),
        CommandKind::Interfaces => {
            let interfaces = interfaces::list();
            if interfaces.is_empty() {
                println!("no interfaces with an IPv4 address found");
            }
            for iface in interfaces {
                println!("{}: {}", iface.name, iface.ipv4);
            }
            Ok(())
        }
    }
}

async fn run_session(args: RunArgs, settings: Settings) -> anyhow::Result<()> {
    let config = SessionConfig::new(
        args.version.parse::<ReceiverVersion>()?,
        args.mode.parse::<HandshakeMode>()?,
        &args.address,
        args.port,
        args.timeout,
        args.netem_delay,
    )?;

    let artifacts = SessionArtifacts::new(&settings.work_dir);
    let mut supervisor = SessionSupervisor::new(config.clone(), artifacts.clone())
        .with_ffprobe(&settings.ffprobe_bin);
    if let Some(bin) = &settings.receiver_bin {
        supervisor = supervisor.with_receiver_bin(bin);
    }

    // Operator terminate control: Ctrl-C unwinds the countdown.
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    if let (Some(interface), Some(delay)) = (&args.interface, config.netem_delay_ms) {
        // Clear out any pre-existing emulation before applying afresh.
        supervisor.clear_network_emulation(interface);
        supervisor.add_network_emulation(interface, delay);
    }

    if let Err(e) = supervisor.start().await {
        // Launch failure is fatal to the attempt; don't leave a delay
        // rule behind on the interface.
        supervisor.teardown().await;
        return Err(e);
    }

    let outcome = countdown::run(&mut supervisor, &mut TerminalDisplay, &mut cancel_rx).await;
    eprintln!();

    match &outcome.endpoint {
        Some(endpoint) => println!("session ended; last connected peer was {endpoint}"),
        None => println!("session ended; no peer connected during the session window"),
    }

    report_session(&supervisor, &artifacts);
    Ok(())
}

/// Print the stats summary and transport-stream report. Failures here are
/// inline display errors, never fatal; the session itself already ended.
fn report_session(supervisor: &SessionSupervisor, artifacts: &SessionArtifacts) {
    match stats::load_records(&artifacts.stats()) {
        Ok(records) => match SessionSummary::from_records(&records) {
            Some(summary) => print_summary(&summary),
            None => println!("statistics file holds no rows"),
        },
        Err(e) => println!("error loading statistics file: {e}"),
    }

    match supervisor.is_valid_transport_stream() {
        Some(true) => match supervisor.programs() {
            Some(programs) => print_programs(&programs),
            None => println!("valid MPEG-TS, but no program information available"),
        },
        Some(false) => println!("no valid MPEG-TS detected"),
        None => println!("transport stream verdict indeterminate (probe failed)"),
    }
}

fn print_summary(summary: &SessionSummary) {
    println!("session time:        {:.1} s", summary.session_time_secs);
    println!("avg receive rate:    {:.2} Mbps", summary.avg_recv_rate_mbps);
    println!("avg round-trip time: {:.2} ms", summary.avg_rtt_ms);
    println!("avg jitter:          {:.2} ms", summary.avg_jitter_ms);
    println!(
        "pkts rcvd/lost/dropped/retrans: {}/{}/{}/{}",
        summary.pkt_recv, summary.pkt_rcv_loss, summary.pkt_rcv_drop, summary.pkt_rcv_retrans
    );
}

fn print_programs(programs: &ProbePrograms) {
    for program in &programs.programs {
        println!(
            "program {} ({} streams)",
            program.program_id.unwrap_or(0),
            program.nb_streams.unwrap_or(0)
        );
        for stream in &program.streams {
            let codec = stream.codec_name.as_deref().unwrap_or("?");
            let kind = stream.codec_type.as_deref().unwrap_or("?");
            match (stream.width, stream.height) {
                (Some(w), Some(h)) => {
                    println!("  stream {}: {kind} {codec} {w}x{h}", stream.index)
                }
                _ => println!("  stream {}: {kind} {codec}", stream.index),
            }
        }
    }
}

async fn run_capture(pcap: &std::path::Path, settings: Settings) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.pcap_dir)?;
    let mut analyzer = CaptureAnalyzer::new(settings.pcap_dir.join(RESULTS_FILE))
        .with_analyzer(&settings.analyzer_bin);

    analyzer.start(pcap)?;
    analyzer.wait().await?;

    println!("{}", analyzer.output()?);
    Ok(())
}

fn run_inspect(settings: Settings) -> anyhow::Result<()> {
    let artifacts = SessionArtifacts::new(&settings.work_dir);
    let inspector =
        TransportStreamInspector::new(artifacts.capture()).with_ffprobe(&settings.ffprobe_bin);

    match inspector.is_valid_transport_stream() {
        Some(true) => {
            println!("valid MPEG-TS: {}", inspector.target().display());
            if let Some(programs) = inspector.programs() {
                print_programs(&programs);
            }
        }
        Some(false) => println!("no valid MPEG-TS detected"),
        None => println!("transport stream verdict indeterminate (probe failed)"),
    }
    Ok(())
}
