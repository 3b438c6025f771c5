//! Build result types.
//!
//! A build is a list of units: one per exported animation, one per injected
//! client script, plus one for each asset that could not be planned. Every
//! unit ends in exactly one [`UnitStatus`].

use std::path::PathBuf;
use std::time::Duration;

/// What a unit operated on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitKind {
    /// One animation of an asset
    Export { asset: PathBuf, animation: String },
    /// One client script
    Inject { client: PathBuf },
    /// A whole asset (parse failures)
    Asset { asset: PathBuf },
    /// The fragment library
    Library,
}

/// Status of a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    /// Sprite strip written
    Exported,
    /// Client script injected (or found already up to date)
    Injected,
    /// Nothing to do
    Skipped,
    /// Work that a dry run would have done
    Planned,
    /// Unit failed with error
    Failed(String),
}

impl UnitStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, UnitStatus::Failed(_))
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitStatus::Exported => write!(f, "exported"),
            UnitStatus::Injected => write!(f, "injected"),
            UnitStatus::Skipped => write!(f, "skipped"),
            UnitStatus::Planned => write!(f, "planned"),
            UnitStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of a single unit.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub kind: UnitKind,
    pub status: UnitStatus,
    /// Files written
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
}

impl UnitResult {
    pub fn new(kind: UnitKind, status: UnitStatus) -> Self {
        Self { kind, status, outputs: vec![], duration: Duration::ZERO }
    }

    /// Create a failed result.
    pub fn failed(kind: UnitKind, error: impl ToString) -> Self {
        Self::new(kind, UnitStatus::Failed(error.to_string()))
    }

    pub fn with_outputs(mut self, outputs: Vec<PathBuf>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Human-readable unit name, e.g. `anims/jab.ase#jab`.
    pub fn unit_id(&self) -> String {
        match &self.kind {
            UnitKind::Export { asset, animation } => format!("{}#{}", asset.display(), animation),
            UnitKind::Inject { client } => client.display().to_string(),
            UnitKind::Asset { asset } => asset.display().to_string(),
            UnitKind::Library => "inject library".to_string(),
        }
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete build run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each unit
    pub units: Vec<UnitResult>,
    /// Total build duration
    pub total_duration: Duration,
    /// Whether this was a dry run
    pub dry_run: bool,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit result.
    pub fn add_result(&mut self, result: UnitResult) {
        self.units.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    fn count(&self, status: &UnitStatus) -> usize {
        self.units.iter().filter(|r| &r.status == status).count()
    }

    pub fn exported_count(&self) -> usize {
        self.count(&UnitStatus::Exported)
    }

    pub fn injected_count(&self) -> usize {
        self.count(&UnitStatus::Injected)
    }

    /// Get the number of skipped units.
    pub fn skipped_count(&self) -> usize {
        self.count(&UnitStatus::Skipped)
    }

    pub fn planned_count(&self) -> usize {
        self.count(&UnitStatus::Planned)
    }

    /// Get the number of failed units.
    pub fn failed_count(&self) -> usize {
        self.units.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the overall build succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.units.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get failed unit results.
    pub fn failures(&self) -> Vec<&UnitResult> {
        self.units.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let exported = self.exported_count();
        let injected = self.injected_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.units.len();

        if self.dry_run {
            lines.push(format!(
                "Dry run: {} units would run, {} skipped ({} total)",
                self.planned_count(),
                skipped,
                total
            ));
            for unit in self.units.iter().filter(|u| u.status == UnitStatus::Planned) {
                lines.push(format!("  - {}", unit.unit_id()));
            }
        } else if failed > 0 {
            lines.push(format!(
                "Build failed: {} exported, {} injected, {} skipped, {} failed ({} total)",
                exported, injected, skipped, failed, total
            ));
        } else {
            lines.push(format!(
                "Build succeeded: {} exported, {} injected, {} skipped ({} total) in {:?}",
                exported, injected, skipped, total, self.total_duration
            ));
        }

        for unit in self.failures() {
            lines.push(format!("  - {}: {}", unit.unit_id(), unit.status));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export(anim: &str, status: UnitStatus) -> UnitResult {
        UnitResult::new(
            UnitKind::Export { asset: PathBuf::from("anims/jab.ase"), animation: anim.to_string() },
            status,
        )
    }

    #[test]
    fn test_unit_status() {
        assert!(UnitStatus::Exported.is_success());
        assert!(UnitStatus::Skipped.is_success());
        assert!(UnitStatus::Failed("x".into()).is_failure());
        assert_eq!(UnitStatus::Failed("boom".into()).to_string(), "failed: boom");
    }

    #[test]
    fn test_unit_id() {
        assert_eq!(export("jab", UnitStatus::Exported).unit_id(), "anims/jab.ase#jab");
        let inject = UnitResult::new(
            UnitKind::Inject { client: PathBuf::from("scripts/a.gml") },
            UnitStatus::Injected,
        );
        assert_eq!(inject.unit_id(), "scripts/a.gml");
    }

    #[test]
    fn test_counts_and_summary() {
        let mut result = BuildResult::new();
        result.add_result(export("jab", UnitStatus::Exported));
        result.add_result(export("ftilt", UnitStatus::Skipped));
        result.add_result(UnitResult::new(
            UnitKind::Inject { client: PathBuf::from("scripts/a.gml") },
            UnitStatus::Injected,
        ));

        assert_eq!(result.exported_count(), 1);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.injected_count(), 1);
        assert!(result.is_success());
        assert!(result.summary().starts_with("Build succeeded: 1 exported, 1 injected, 1 skipped"));
    }

    #[test]
    fn test_summary_lists_failures() {
        let mut result = BuildResult::new();
        result.add_result(export("jab", UnitStatus::Exported));
        result.add_result(UnitResult::failed(
            UnitKind::Export { asset: PathBuf::from("anims/jab.ase"), animation: "nair".into() },
            "tool missing",
        ));

        assert!(!result.is_success());
        let summary = result.summary();
        assert!(summary.starts_with("Build failed: 1 exported"));
        assert!(summary.contains("anims/jab.ase#nair: failed: tool missing"));
    }

    #[test]
    fn test_dry_run_summary() {
        let mut result = BuildResult { dry_run: true, ..BuildResult::default() };
        result.add_result(export("jab", UnitStatus::Planned));
        result.add_result(export("nair", UnitStatus::Skipped));

        let summary = result.summary();
        assert!(summary.starts_with("Dry run: 1 units would run, 1 skipped"));
        assert!(summary.contains("anims/jab.ase#jab"));
    }
}
