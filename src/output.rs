use console::style;

use crate::trigger::TriggerOutcome;

// Styling helpers

fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

fn magenta_bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

// Banner

pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🚀 citrig"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Downstream Pipeline Trigger")
    );
}

/// Prints what an invocation created. The pipeline URL goes to stdout so
/// scripts can capture it; everything else stays on stderr.
pub fn print_outcome(outcome: &TriggerOutcome) {
    if let Some(job) = &outcome.job {
        eprintln!(
            "{}",
            dim(format!("Following job '{}' (id {})", job.name, job.id))
        );
    }

    println!("{}", outcome.pipeline.url);
}
