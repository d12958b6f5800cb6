//! Terminal report rendering. Kept separate from the probe/aggregate logic
//! so the generated text can be unit-tested independent of ANSI styling.

use colored::Colorize;

use crate::prober::{ProbePhase, ProbeResult};

pub fn render(probe: &ProbeResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}\n", "Concurrency Probe Report".bold()));
    out.push_str(&"=".repeat(72));
    out.push('\n');

    out.push_str(&format!(
        "{:<12}{:<10}{:<10}{:<10}{:<10}{:<10}{:<10}\n",
        "Phase", "K", "Total", "Success%", "P99(ms)", "RPS", "Verdict"
    ));
    for level in &probe.levels {
        let phase = phase_label(level.phase);
        let success_pct = level.result.success_rate * 100.0;
        let p99_ms = level.result.latency_distribution.p99 / 1000.0;
        let verdict = if level.verdict.pass {
            "PASS".green()
        } else {
            "FAIL".red()
        };
        out.push_str(&format!(
            "{:<12}{:<10}{:<10}{:<9.3}{:<10.1}{:<10.1}{}\n",
            phase,
            level.result.concurrency,
            level.result.total_requests,
            success_pct,
            p99_ms,
            level.result.throughput,
            verdict
        ));
    }

    out.push_str(&"-".repeat(72));
    out.push('\n');

    if probe.cancelled {
        out.push_str(&format!("{}\n", "Probe cancelled before completion.".yellow()));
    }

    out.push_str(&format!(
        "{}: {}\n",
        "max_concurrency".bold(),
        probe.max_concurrency
    ));
    out.push_str(&format!(
        "{}: {}\n",
        "effective_concurrency".bold(),
        probe.effective_concurrency
    ));
    out.push_str(&format!(
        "{}: {:.1} req/s\n",
        "saturated_throughput".bold(),
        probe.saturated_throughput
    ));
    out.push_str(&format!(
        "{}: {}\n",
        "recommended_ceiling".bold(),
        probe.recommended_ceiling
    ));

    out
}

fn phase_label(phase: ProbePhase) -> &'static str {
    match phase {
        ProbePhase::Warmup => "warmup",
        ProbePhase::Growth => "growth",
        ProbePhase::Bisection => "bisect",
        ProbePhase::Stability => "stability",
        ProbePhase::Manual => "manual",
    }
}
