use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{ProgressBar, ProgressStyle};
use rangestitch::{
    plan_ranges, plan_ranges_mib, range_length, ByteRange, DirSegmentSource, MergeConfig, MergeEvent, Merger, SegmentSource,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

fn build_cli() -> Command {
    let plan = Command::new("plan")
        .about("Split a file size into byte ranges")
        .arg(
            Arg::new("size")
                .long("size")
                .help("Total file size in bytes")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("chunk_bytes")
                .long("chunk-bytes")
                .help("Maximum segment size in bytes")
                .conflicts_with("chunk_mb")
                .num_args(1),
        )
        .arg(
            Arg::new("chunk_mb")
                .long("chunk-mb")
                .help("Maximum segment size in MiB")
                .default_value("8")
                .num_args(1),
        );

    let seg_size = Command::new("seg-size")
        .about("Print the byte length implied by a segment name")
        .arg(Arg::new("range").help("Segment name, e.g. 200-1000").required(true));

    let merge = Command::new("merge")
        .about("Merge downloaded segments into the target file")
        .arg(
            Arg::new("segments")
                .long("segments")
                .help("Directory holding segment files named start-end")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("target")
                .long("target")
                .help("File to assemble")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("ranges")
                .help("Ranges to merge; defaults to every segment in the directory")
                .action(ArgAction::Append)
                .num_args(0..),
        )
        .arg(
            Arg::new("keep_segments")
                .long("keep-segments")
                .help("Leave merged segment files on disk")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no_verify")
                .long("no-verify")
                .help("Merge segments even when their size disagrees with their range")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cleanup")
                .long("cleanup")
                .help("Remove the segment directory once everything is merged")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("buffer_kb")
                .long("buffer-kb")
                .help("Copy buffer size in KiB")
                .default_value("64")
                .num_args(1),
        );

    Command::new("rangestitch")
        .about("Plan byte ranges and stitch downloaded segments back together")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(plan)
        .subcommand(seg_size)
        .subcommand(merge)
}

fn merge_config(m: &ArgMatches) -> anyhow::Result<MergeConfig> {
    let kb: usize = required(m, "buffer_kb")?
        .parse()
        .context("invalid --buffer-kb")?;
    let copy_buffer_bytes = kb
        .max(1)
        .checked_mul(1024)
        .with_context(|| format!("--buffer-kb {kb} too large"))?;
    Ok(MergeConfig {
        remove_merged: !m.get_flag("keep_segments"),
        verify_sizes: !m.get_flag("no_verify"),
        copy_buffer_bytes,
    })
}

fn required<'a>(m: &'a ArgMatches, id: &str) -> anyhow::Result<&'a String> {
    m.get_one::<String>(id).with_context(|| format!("missing --{id}"))
}

fn run_plan(m: &ArgMatches) -> anyhow::Result<()> {
    let size: u64 = required(m, "size")?.parse().context("invalid --size")?;
    let ranges = match m.get_one::<String>("chunk_bytes") {
        Some(s) => plan_ranges(size, s.parse().context("invalid --chunk-bytes")?)?,
        None => plan_ranges_mib(size, required(m, "chunk_mb")?.parse().context("invalid --chunk-mb")?)?,
    };
    tracing::debug!(size, count = ranges.len(), "planned ranges");
    for r in &ranges {
        println!("{}\t{}", r, fmt_bytes(r.len()));
    }
    Ok(())
}

async fn run_merge(m: &ArgMatches) -> anyhow::Result<bool> {
    let segments: PathBuf = required(m, "segments")?.into();
    let target: PathBuf = required(m, "target")?.into();
    let cfg = merge_config(m)?;
    let source = DirSegmentSource::new(&segments);

    let pending: Vec<ByteRange> = match m.get_many::<String>("ranges") {
        Some(values) => values
            .map(|s| s.parse::<ByteRange>().with_context(|| format!("invalid range {s}")))
            .collect::<anyhow::Result<_>>()?,
        None => source
            .list()
            .await
            .with_context(|| format!("list segments in {}", segments.display()))?,
    };

    let merger = Merger::new(cfg);
    let rx = merger.subscribe();
    let pb = ProgressBar::new(pending.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} segments {wide_msg}")?,
    );
    let ui = tokio::spawn(drive_progress(rx, pb.clone()));

    let outcome = merger.merge(&pending, &source, &target).await;
    drop(merger);
    let _ = ui.await;
    pb.finish_and_clear();
    let outcome = outcome?;

    println!("merged {} segment(s) into {}", outcome.merged.len(), target.display());
    if !outcome.is_complete() {
        println!("pending:");
        for r in &outcome.pending {
            println!("{r}");
        }
        return Ok(false);
    }

    if m.get_flag("cleanup") {
        Merger::default().cleanup_segment_dir(&segments).await?;
    }
    Ok(true)
}

/// Feeds merge events into the bar until the pass finishes or the merger goes away.
async fn drive_progress(mut rx: broadcast::Receiver<MergeEvent>, pb: ProgressBar) {
    loop {
        let evt = match rx.recv().await {
            Ok(e) => e,
            Err(RecvError::Lagged(n)) => {
                tracing::debug!(skipped = n, "progress fell behind merge events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match evt {
            MergeEvent::PassStarted { target, .. } => pb.set_message(target.display().to_string()),
            MergeEvent::SegmentMerged { range, .. } => {
                pb.inc(1);
                pb.set_message(format!("merged {range}"));
            }
            MergeEvent::SegmentLeftPending { range, reason } => {
                pb.inc(1);
                pb.println(format!("[PENDING] {range}: {reason}"));
            }
            MergeEvent::PassFinished { .. } => break,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    match matches.subcommand() {
        Some(("plan", m)) => run_plan(m)?,
        Some(("seg-size", m)) => {
            let name = required(m, "range")?;
            println!("{}", range_length(name)?);
        }
        Some(("merge", m)) => {
            if !run_merge(m).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        _ => {}
    }

    Ok(ExitCode::SUCCESS)
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.2}GiB", f / GB)
    } else if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}
