use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// Progress tracking for the metadata and pipeline phases
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_phase_1(project_count: usize) -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        let pb = create_spinner(
            bright_yellow(format!("Phase 1/2: Fetching metadata for {project_count} projects"))
                .to_string(),
        );
        Self { pb }
    }

    pub fn finish_phase_1_start_phase_2(self, parsed: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 1/2: Fetched metadata for {parsed} projects ✓"))
                .to_string(),
        );
        let pb = create_spinner(bright_yellow("Phase 2/2: Fetching pipelines").to_string());
        Self { pb }
    }

    pub fn finish_phase_2(self, listed: usize, pipelines: usize) {
        self.pb.finish_with_message(
            bright_green(format!(
                "Phase 2/2: Fetched {pipelines} pipelines for {listed} projects ✓"
            ))
            .to_string(),
        );
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
