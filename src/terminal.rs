use std::io::{self, Write};

use advisor_core::types::CompletionReason;
use advisor_render::payload::{allocation_total, Allocation};
use advisor_render::RenderCommand;

/// Print one render command to stdout. Decode failures go to stderr.
pub fn print_command(command: &RenderCommand) {
    match command {
        RenderCommand::Header { label, title } => {
            println!();
            println!("== {} ({}) ==", title, label);
        }
        RenderCommand::FinancialAnalysis(analysis) => {
            println!("Risk profile: {}", analysis.risk_profile);
            println!("  {}", analysis.risk_profile_reason);
            println!(
                "Required annual return: {:.2}%",
                analysis.required_annual_return_rate
            );
            println!("  {}", analysis.return_rate_reason);
        }
        RenderCommand::Portfolio(portfolio) => {
            println!("Allocation:");
            print_allocation(&portfolio.portfolio_allocation);
            println!("Strategy: {}", portfolio.strategy);
            println!("Reason: {}", portfolio.reason);
        }
        RenderCommand::RiskScenarios(risk) => {
            for (n, scenario) in risk.scenarios() {
                println!("Scenario {}: {}", n, scenario.name);
                println!("  {}", scenario.description);
                println!("  Adjusted allocation:");
                print_allocation(&scenario.allocation_management);
                println!("  Reason: {}", scenario.reason);
            }
        }
        RenderCommand::Report {
            markdown,
            highlights,
        } => {
            println!("{}", markdown);
            if !highlights.is_empty() {
                println!();
                println!("Highlights: {}", highlights.join(", "));
            }
        }
        RenderCommand::ReviewFailed { explanation } => {
            println!("Review failed: the analysis was rejected.");
            if !explanation.is_empty() {
                println!("  {}", explanation);
            }
        }
        RenderCommand::PromptText { text } => {
            println!("{}", text);
        }
        RenderCommand::NodeError(err) => {
            eprintln!("[{}: ERROR] {}", err.node, err.message);
            eprintln!("  raw: {}", truncate(&err.raw, 200));
        }
        RenderCommand::Completed { reason } => {
            println!();
            match reason {
                CompletionReason::Success => println!("Flow complete."),
                CompletionReason::InputRequired => println!("Flow stopped: input required."),
                CompletionReason::Unknown => println!("Flow stopped."),
            }
        }
    }
    io::stdout().flush().ok();
}

fn print_allocation(allocation: &Allocation) {
    for (ticker, pct) in allocation {
        println!("    {:<8} {:>3}% {}", ticker, pct, bar(*pct));
    }
    let total = allocation_total(allocation);
    if total != 100 {
        println!("    (total {}%)", total);
    }
}

fn bar(pct: u32) -> String {
    "#".repeat((pct.min(100) / 5) as usize)
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}
