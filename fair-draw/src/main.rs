use std::collections::BTreeSet;
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use fair_draw::{
    cli::{Cli, Command, DrawArgs, FileArgs, ShowArgs},
    codec,
    config::DrawConfig,
    fairness,
    runtime::spawn_engine,
    DrawEvent,
};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Draw(args) => run_draw(args).await,
        Command::Show(args) => show(args),
        Command::Normalize(args) => normalize(args),
    }
}

async fn run_draw(args: DrawArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => DrawConfig::from_json_file(path)?,
        None => DrawConfig::default(),
    };
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (handle, events, worker) = spawn_engine(rng);
    handle.set_config(config).await?;

    let path = &args.roster.file;
    if args.no_save {
        let roster = codec::load_file(path)?;
        handle.load_roster(roster, None).await?;
    } else {
        handle
            .load_file(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?;
    }

    let names = handle
        .status()
        .await?
        .roster
        .iter()
        .map(|entry| entry.name.clone())
        .collect();
    handle.start_batch(args.count).await?;

    let mut printer = Printer {
        names,
        json: args.json,
    };
    let outcome = watch_batch(&handle, events, &mut printer).await;

    handle.shutdown()?;
    let _ = worker.await;
    outcome
}

/// Prints events until the batch completes or is cancelled. Ctrl-C cancels.
async fn watch_batch(
    handle: &fair_draw::runtime::EngineHandle,
    mut events: UnboundedReceiver<DrawEvent>,
    printer: &mut Printer,
) -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    anyhow::bail!("draw engine stopped unexpectedly");
                };
                let finished = matches!(
                    event,
                    DrawEvent::BatchComplete { .. } | DrawEvent::BatchCancelled { .. }
                );
                printer.print(&event)?;
                if finished {
                    return Ok(());
                }
            }
            result = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(err) = result {
                    warn!(error = ?err, "failed to listen for ctrl-c");
                    continue;
                }
                info!("interrupted, cancelling draw");
                handle.cancel().await?;
            }
        }
    }
}

struct Printer {
    names: Vec<String>,
    json: bool,
}

impl Printer {
    fn print(&mut self, event: &DrawEvent) -> Result<()> {
        let mut out = io::stdout().lock();
        if self.json {
            writeln!(out, "{}", serde_json::to_string(event)?)?;
            return Ok(());
        }

        match event {
            DrawEvent::ScanHighlight { index } => {
                write!(out, "\r  > {:<40}", self.name(*index))?;
                out.flush()?;
            }
            DrawEvent::WinnerRevealed { index } => {
                write!(out, "\r  * {:<40}", self.name(*index))?;
                out.flush()?;
            }
            DrawEvent::BatchProgress {
                drawn,
                total,
                winner,
            } => writeln!(out, "\r[{drawn}/{total}] {winner:<40}")?,
            DrawEvent::BatchComplete { winners } => {
                writeln!(out, "Winners: {}", winners.join(", "))?
            }
            DrawEvent::BatchCancelled { reason } => writeln!(out, "\rDraw cancelled: {reason}")?,
            DrawEvent::SaveError { message } => eprintln!("warning: counters not saved: {message}"),
            DrawEvent::LoadError { message } => eprintln!("error: {message}"),
            _ => {}
        }
        Ok(())
    }

    fn name(&self, index: usize) -> &str {
        self.names.get(index).map_or("?", String::as_str)
    }
}

fn show(args: ShowArgs) -> Result<()> {
    let roster = codec::load_file(&args.roster.file)?;
    let mut out = io::stdout().lock();
    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&roster)?)?;
        return Ok(());
    }

    let eligible: BTreeSet<usize> = fairness::eligible(&roster).into_iter().collect();
    writeln!(out, "   {:<40} {:>7}", "Name", "Counter")?;
    for (index, entry) in roster.iter().enumerate() {
        let marker = if eligible.contains(&index) { '*' } else { ' ' };
        writeln!(out, " {marker} {:<40} {:>7}", entry.name, entry.counter)?;
    }
    writeln!(out, "{} entries, {} eligible", roster.len(), eligible.len())?;
    Ok(())
}

fn normalize(args: FileArgs) -> Result<()> {
    let mut roster = codec::load_file(&args.file)?;
    let shift = fairness::normalize(&mut roster);
    codec::save(&args.file, &roster)
        .with_context(|| format!("failed to save {}", args.file.display()))?;
    println!("Subtracted {shift} from every counter in {}", args.file.display());
    Ok(())
}
