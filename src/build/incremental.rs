//! Incremental build support.
//!
//! Runs one build over the project, doing only the work invalidated since the
//! last run.
//!
//! # How It Works
//!
//! 1. Load the persisted [`BuildState`] (`.aseforge-state.json`)
//! 2. Discover assets, client scripts and library files
//! 3. Plan: parse stale assets, decompose their tags and pick the animations
//!    whose fingerprint changed; pick clients that changed or whose library
//!    dependencies changed
//! 4. Execute the export and injection units on a worker pool
//! 5. Fold the outcomes into a new state and save it
//!
//! A failed unit never blocks its siblings. Its asset or client is left out
//! of the new state's seen set, so the next run picks it up again.
//!
//! # Example
//!
//! ```ignore
//! use aseforge::build::{BuildContext, IncrementalBuild};
//!
//! let context = BuildContext::new(config, project_root);
//! let result = IncrementalBuild::new(context).run()?;
//!
//! println!("Exported: {}, Skipped: {}", result.exported_count(), result.skipped_count());
//! ```

use crate::aseprite::{AsepriteParser, AssetParser};
use crate::build::{
    discover_assets, discover_library_files, discover_scripts, plan_clients, AssetPlan, AssetPlanner,
    BuildContext, BuildResult, BuildState, ClientPlan, DiscoveryError, ExportUnit, StateError,
    UnitKind, UnitResult, UnitStatus, WorkerPool,
};
use crate::config::ConfigValidationError;
use crate::export::{remove_old_strips, AsepriteCli, ExportError, Exporter};
use crate::injection::{inject_file, DirectoryLibrary, Injection, InjectionError};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// Error that aborts a build before or after its units run.
#[derive(Debug)]
pub enum BuildError {
    /// Tag color configuration is unusable
    Config(Vec<ConfigValidationError>),
    /// State file unreadable, or could not be saved
    State(StateError),
    /// Discovery error
    Discovery(DiscoveryError),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Config(errors) => {
                write!(f, "Config error:")?;
                for e in errors {
                    write!(f, "\n  - {}", e)?;
                }
                Ok(())
            }
            BuildError::State(e) => write!(f, "State error: {} (use --force to rebuild it)", e),
            BuildError::Discovery(e) => write!(f, "Discovery error: {}", e),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<DiscoveryError> for BuildError {
    fn from(e: DiscoveryError) -> Self {
        BuildError::Discovery(e)
    }
}

impl From<StateError> for BuildError {
    fn from(e: StateError) -> Self {
        BuildError::State(e)
    }
}

/// One unit of work handed to the pool.
enum Job<'p> {
    Export(&'p ExportUnit),
    Inject { key: &'p Path, path: &'p Path },
}

/// What a worker reports back.
enum Outcome<'p> {
    Export { unit: &'p ExportUnit, result: Result<Vec<PathBuf>, ExportError>, duration: Duration },
    Inject { key: &'p Path, result: Result<Injection, InjectionError>, duration: Duration },
}

/// Incremental build pipeline.
pub struct IncrementalBuild {
    /// Build context
    context: BuildContext,
    parser: Box<dyn AssetParser>,
    exporter: Box<dyn Exporter>,
}

impl IncrementalBuild {
    /// Create a build using the Aseprite parser and the configured
    /// Aseprite executable.
    pub fn new(context: BuildContext) -> Self {
        let export = &context.config().export;
        let exporter =
            AsepriteCli::new(export.aseprite_path.clone(), Duration::from_secs(export.timeout_secs));
        Self { context, parser: Box::new(AsepriteParser), exporter: Box::new(exporter) }
    }

    /// Replace the asset parser.
    pub fn with_parser(mut self, parser: impl AssetParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    /// Replace the exporter.
    pub fn with_exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.exporter = Box::new(exporter);
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// Load the state this run starts from.
    ///
    /// A forced run starts from scratch, so it also recovers from a corrupt
    /// or outdated state file.
    pub fn load_state(&self) -> Result<BuildState, BuildError> {
        if self.context.is_force() {
            return Ok(BuildState::new());
        }
        Ok(BuildState::load(&self.context.state_path())?.unwrap_or_default())
    }

    /// Run the incremental build.
    pub fn run(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let run_started = SystemTime::now();
        let ctx = &self.context;

        let colors = ctx.config().tag_colors().map_err(BuildError::Config)?;
        let state = self.load_state()?;

        let assets = discover_assets(ctx)?;
        let clients = discover_scripts(ctx)?;
        let library_files = discover_library_files(ctx)?;
        debug!(
            assets = assets.len(),
            clients = clients.len(),
            library_files = library_files.len(),
            "discovered"
        );

        let key_of = |p: &Path| ctx.state_key(p);
        let asset_plans = AssetPlanner::new(
            self.parser.as_ref(),
            &colors,
            &state,
            ctx.anims_dir(),
            ctx.sprites_dir(),
        )
        .with_scale(ctx.config().export.scale())
        .with_force(ctx.is_force())
        .plan_all(&assets, key_of);
        let client_plans = plan_clients(&state, ctx.is_force(), &clients, &library_files, key_of);

        if ctx.is_dry_run() {
            let mut result = dry_run_result(&asset_plans, &client_plans);
            result.total_duration = start.elapsed();
            return Ok(result);
        }

        let mut result = BuildResult::new();
        let needs_library = client_plans.iter().any(|p| matches!(p, ClientPlan::Stale { .. }));
        let library = if needs_library {
            match DirectoryLibrary::load(&ctx.inject_dir()) {
                Ok(library) => Some(library),
                Err(e) => {
                    warn!(error = %e, "inject library unavailable");
                    result.add_result(UnitResult::failed(UnitKind::Library, e));
                    None
                }
            }
        } else {
            None
        };

        let mut jobs: Vec<Job<'_>> = Vec::new();
        for plan in &asset_plans {
            if let AssetPlan::Stale(work) = plan {
                jobs.extend(work.exports.iter().map(Job::Export));
            }
        }
        if library.is_some() {
            for plan in &client_plans {
                if let ClientPlan::Stale { key, path, .. } = plan {
                    jobs.push(Job::Inject { key: key.as_path(), path: path.as_path() });
                }
            }
        }

        let pool = WorkerPool::new(ctx.jobs());
        debug!(units = jobs.len(), workers = pool.jobs(), "executing");
        let outcomes = pool.run(&jobs, |job| self.execute(job, library.as_ref(), run_started));

        let mut next = BuildState::new();
        next.last_run_time = Some(run_started);
        next.anim_hashes = state.anim_hashes.clone();
        next.dependencies = state.dependencies.clone();

        self.apply(&mut next, &mut result, &asset_plans, &client_plans, outcomes);

        // Library files count as processed only when the library was usable.
        if !needs_library || library.is_some() {
            for file in &library_files {
                next.mark_seen(&key_of(&file.path));
            }
        }

        next.save(&ctx.state_path())?;

        result.total_duration = start.elapsed();
        Ok(result)
    }

    fn execute<'p>(
        &self,
        job: &Job<'p>,
        library: Option<&DirectoryLibrary>,
        run_started: SystemTime,
    ) -> Outcome<'p> {
        let started = Instant::now();
        match *job {
            Job::Export(unit) => {
                let result = self.export(unit);
                Outcome::Export { unit, result, duration: started.elapsed() }
            }
            Job::Inject { key, path } => {
                let result = match library {
                    Some(library) => inject_file(path, library).inspect(|injection| {
                        if injection.changed {
                            backdate(path, run_started);
                        }
                    }),
                    None => Err(InjectionError::Library("not loaded".to_string())),
                };
                Outcome::Inject { key, result, duration: started.elapsed() }
            }
        }
    }

    fn export(&self, unit: &ExportUnit) -> Result<Vec<PathBuf>, ExportError> {
        let removed = remove_old_strips(&self.context.sprites_dir(), &unit.base_name)?;
        if removed > 0 {
            debug!(base = %unit.base_name, removed, "removed old strips");
        }
        self.exporter.export(&unit.request)?;
        if unit.request.is_empty() {
            Ok(vec![])
        } else {
            Ok(vec![unit.request.destination.clone()])
        }
    }

    /// Fold unit outcomes into the next state. Runs on one thread after
    /// every worker has finished.
    fn apply(
        &self,
        next: &mut BuildState,
        result: &mut BuildResult,
        asset_plans: &[AssetPlan],
        client_plans: &[ClientPlan],
        outcomes: Vec<Outcome<'_>>,
    ) {
        let mut failed_assets: BTreeSet<&Path> = BTreeSet::new();
        let mut injected_clients: BTreeSet<&Path> = BTreeSet::new();

        for plan in asset_plans {
            match plan {
                AssetPlan::Fresh { .. } => {}
                AssetPlan::Failed { key, error } => {
                    warn!(asset = %key.display(), %error, "asset failed");
                    failed_assets.insert(key.as_path());
                    result.add_result(UnitResult::failed(UnitKind::Asset { asset: key.clone() }, error));
                }
                AssetPlan::Stale(work) => {
                    next.anim_hashes
                        .retain_animations(&work.key, work.animations.iter().map(|a| a.name.as_str()));
                    for anim in work.skipped() {
                        debug!(asset = %work.key.display(), animation = %anim.name, "unchanged");
                        result.add_result(UnitResult::new(
                            UnitKind::Export { asset: work.key.clone(), animation: anim.name.clone() },
                            UnitStatus::Skipped,
                        ));
                    }
                }
            }
        }

        for outcome in outcomes {
            match outcome {
                Outcome::Export { unit, result: outcome, duration } => {
                    let kind = UnitKind::Export {
                        asset: unit.asset.clone(),
                        animation: unit.animation.name.clone(),
                    };
                    match outcome {
                        Ok(outputs) => {
                            info!(
                                asset = %unit.asset.display(),
                                animation = %unit.animation.name,
                                "exported"
                            );
                            if let Some(hash) = &unit.animation.content_hash {
                                next.anim_hashes.record(&unit.asset, &unit.animation, hash);
                            }
                            result.add_result(
                                UnitResult::new(kind, UnitStatus::Exported)
                                    .with_outputs(outputs)
                                    .with_duration(duration),
                            );
                        }
                        Err(error) => {
                            warn!(
                                asset = %unit.asset.display(),
                                animation = %unit.animation.name,
                                %error,
                                "export failed"
                            );
                            next.anim_hashes.forget(&unit.asset, &unit.animation.name);
                            failed_assets.insert(unit.asset.as_path());
                            result.add_result(UnitResult::failed(kind, error).with_duration(duration));
                        }
                    }
                }
                Outcome::Inject { key, result: outcome, duration } => {
                    let kind = UnitKind::Inject { client: key.to_path_buf() };
                    match outcome {
                        Ok(injection) => {
                            let deps: BTreeSet<PathBuf> = injection
                                .dependencies
                                .iter()
                                .map(|p| self.context.state_key(p))
                                .collect();
                            if injection.changed {
                                info!(client = %key.display(), fragments = injection.fragments.len(), "injected");
                            } else {
                                debug!(client = %key.display(), "injection up to date");
                            }
                            next.dependencies.set_dependencies(key, deps);
                            injected_clients.insert(key);
                            let unit = if injection.changed {
                                UnitResult::new(kind, UnitStatus::Injected)
                                    .with_outputs(vec![self.context.resolve_path(key)])
                            } else {
                                UnitResult::new(kind, UnitStatus::Skipped)
                            };
                            result.add_result(unit.with_duration(duration));
                        }
                        Err(error) => {
                            warn!(client = %key.display(), %error, "injection failed");
                            result.add_result(UnitResult::failed(kind, error).with_duration(duration));
                        }
                    }
                }
            }
        }

        // Seen set: everything on disk that is fresh or was processed cleanly.
        let mut on_disk: BTreeSet<&Path> = BTreeSet::new();
        for plan in asset_plans {
            let key = plan.key();
            on_disk.insert(key);
            if !failed_assets.contains(key) {
                next.mark_seen(key);
            }
        }
        let stale_assets: Vec<PathBuf> =
            next.anim_hashes.assets().filter(|a| !on_disk.contains(a.as_path())).cloned().collect();
        for asset in stale_assets {
            debug!(asset = %asset.display(), "asset deleted, dropping fingerprints");
            next.anim_hashes.forget_asset(&asset);
        }

        let mut clients_on_disk: BTreeSet<&Path> = BTreeSet::new();
        for plan in client_plans {
            clients_on_disk.insert(plan.key());
            match plan {
                ClientPlan::Fresh { key } => next.mark_seen(key),
                ClientPlan::Stale { key, .. } => {
                    if injected_clients.contains(key.as_path()) {
                        next.mark_seen(key);
                    }
                }
            }
        }
        let gone: Vec<PathBuf> = next
            .dependencies
            .clients()
            .filter(|c| !clients_on_disk.contains(c.as_path()))
            .cloned()
            .collect();
        for client in gone {
            debug!(client = %client.display(), "client deleted, dropping dependencies");
            next.dependencies.remove_client(&client);
        }
    }
}

/// Stamp a file this run rewrote with the run's start time. Its own write
/// must not make it look edited to the next run.
fn backdate(path: &Path, to: SystemTime) {
    let stamped = fs::File::options().write(true).open(path).and_then(|file| file.set_modified(to));
    if let Err(error) = stamped {
        warn!(path = %path.display(), %error, "could not reset mtime, file is re-checked next run");
    }
}

/// Result of a dry run: what would run, and what would be skipped.
fn dry_run_result(asset_plans: &[AssetPlan], client_plans: &[ClientPlan]) -> BuildResult {
    let mut result = BuildResult { dry_run: true, ..BuildResult::default() };
    for plan in asset_plans {
        match plan {
            AssetPlan::Fresh { .. } => {}
            AssetPlan::Failed { key, error } => {
                result.add_result(UnitResult::failed(UnitKind::Asset { asset: key.clone() }, error));
            }
            AssetPlan::Stale(work) => {
                for unit in &work.exports {
                    result.add_result(UnitResult::new(
                        UnitKind::Export { asset: work.key.clone(), animation: unit.animation.name.clone() },
                        UnitStatus::Planned,
                    ));
                }
                for anim in work.skipped() {
                    result.add_result(UnitResult::new(
                        UnitKind::Export { asset: work.key.clone(), animation: anim.name.clone() },
                        UnitStatus::Skipped,
                    ));
                }
            }
        }
    }
    for plan in client_plans {
        if let ClientPlan::Stale { key, .. } = plan {
            result.add_result(UnitResult::new(UnitKind::Inject { client: key.clone() }, UnitStatus::Planned));
        }
    }
    result
}
