//! Terminal output for the threat-check CLI.
//!
//! Spinner, run header, verdict summary and the distribution table. Uses
//! only the `console` crate. Everything decorative goes to stderr or is
//! skipped in `--json` mode so stdout stays machine-readable.

use console::{pad_str, style, Alignment, StyledObject, Term};
use std::time::Duration;
use threat_check_lib::{Distribution, ResultSet, RunConfig, Verdict};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const SPINNER_TICK: Duration = Duration::from_millis(80);

/// Progress indicator on stderr while a batch is in flight.
///
/// The animation runs on its own task and ends when `stop` sends the
/// shutdown signal.
pub struct Spinner {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Spinner {
    /// Start animating `message`, or return `None` when stderr is not a terminal.
    pub fn start(message: String) -> Option<Self> {
        let term = Term::stderr();
        if !term.is_term() {
            return None;
        }

        let (shutdown, mut stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SPINNER_TICK);
            for frame in SPINNER_FRAMES.iter().cycle() {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let line = format!("{} {}", style(frame).cyan(), message);
                        let _ = term.clear_line().and_then(|_| term.write_str(&line));
                    }
                }
            }
            let _ = term.clear_line();
        });

        Some(Self { shutdown, task })
    }

    /// Signal the animation to finish and wait until the line is cleared.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Print the run header: URL count and pool settings.
pub fn print_header(url_count: usize, config: &RunConfig) {
    println!(
        "{} {} {}",
        style("threat-check").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "| Checking {} URL{}",
            url_count,
            if url_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );

    let categories: Vec<&str> = config.pool.categories.iter().map(|c| c.as_str()).collect();
    println!(
        "{}",
        style(format!(
            "Concurrency: {} | Workers: {} | Timeout: {}s | Threat types: {}",
            config.pool.concurrency,
            config.pool.effective_workers(),
            config.pool.timeout.as_secs(),
            categories.join(", ")
        ))
        .dim()
    );
    println!();
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Color a verdict label the same way everywhere.
fn styled_label(label: &str) -> StyledObject<&str> {
    match label.trim_end() {
        "SAFE" => style(label).green().bold(),
        "ERROR" => style(label).yellow(),
        _ => style(label).red().bold(),
    }
}

/// Print one line per flagged or failed URL, then verdict totals.
pub fn print_summary(results: &ResultSet, results_path: &std::path::Path) {
    let mut safe = 0;
    let mut threats = 0;
    let mut errors = 0;

    for (url, verdict) in results.iter() {
        match verdict {
            Verdict::Safe => safe += 1,
            Verdict::Threats(_) => {
                threats += 1;
                let label = verdict.label();
                println!(
                    "  {}  {}",
                    style(pad_str(url, 50, Alignment::Left, Some(".."))).white(),
                    styled_label(&label),
                );
            }
            Verdict::Error => {
                errors += 1;
                println!(
                    "  {}  {}",
                    style(pad_str(url, 50, Alignment::Left, Some(".."))).white(),
                    styled_label("ERROR"),
                );
            }
        }
    }

    if threats + errors > 0 {
        println!();
    }

    let total = results.len();
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} URL{}  {}  {}  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        style("|").dim(),
        style(format!("{} safe", safe)).green(),
        style("|").dim(),
        style(format!("{} flagged", threats)).red(),
        style("|").dim(),
        style(format!("{} errors", errors)).yellow(),
    );
    println!(
        "  {}",
        style(format!("Results saved to {}", results_path.display())).dim()
    );
    println!();
}

/// Print the percentage breakdown, one label per line.
pub fn print_distribution(distribution: &Distribution) {
    println!("{}", style("Threat Type Distribution").bold());
    for share in &distribution.shares {
        println!(
            "  {}  {}",
            styled_label(&pad_str(&share.label, 40, Alignment::Left, None)),
            style(format!("{:>6.2}%", share.percentage)).bold(),
        );
    }
}
