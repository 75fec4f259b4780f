//! Named stages with dependency edges, executed in topological order.
//!
//! Stages only declare ordering. A stage whose guard is false is skipped, and
//! its dependents still run. The first failing action halts the run; side
//! effects of stages that already completed are kept.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::error::EngineError;

/// Side-effecting body of a stage.
pub type Action = Box<dyn FnMut() -> Result<(), EngineError>>;

/// A check evaluated right before a stage would execute.
pub type Check = Box<dyn Fn() -> bool>;

/// A named unit of work in a [`Pipeline`].
pub struct Stage {
    name: String,
    description: String,
    dependencies: BTreeSet<String>,
    always_run: bool,
    action: Action,
    guard: Option<Check>,
    up_to_date: Option<Check>,
}

impl Stage {
    /// Create a stage that reruns on every invocation.
    pub fn new<F>(name: &str, action: F) -> Self
    where
        F: FnMut() -> Result<(), EngineError> + 'static,
    {
        Self {
            name: name.to_owned(),
            description: String::new(),
            dependencies: BTreeSet::new(),
            always_run: true,
            action: Box::new(action),
            guard: None,
            up_to_date: None,
        }
    }

    #[must_use]
    pub fn describe(mut self, description: &str) -> Self {
        description.clone_into(&mut self.description);
        self
    }

    #[must_use]
    pub fn depends_on(mut self, dependency: &str) -> Self {
        self.dependencies.insert(dependency.to_owned());
        self
    }

    #[must_use]
    pub fn depends_on_all<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(|d| d.as_ref().to_owned()));
        self
    }

    /// Skip the stage, without failing, when `guard` returns false.
    #[must_use]
    pub fn only_if<F>(mut self, guard: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.guard = Some(Box::new(guard));
        self
    }

    /// Let the stage be skipped as up to date when `check` returns true.
    ///
    /// This clears the always-run flag.
    #[must_use]
    pub fn up_to_date_when<F>(mut self, check: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.up_to_date = Some(Box::new(check));
        self.always_run = false;
        self
    }

    /// Force the stage to run every time, ignoring any up-to-date check.
    #[must_use]
    pub fn always_run(mut self, always_run: bool) -> Self {
        self.always_run = always_run;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    pub fn is_always_run(&self) -> bool {
        self.always_run
    }

    pub fn is_guarded(&self) -> bool {
        self.guard.is_some()
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("always_run", &self.always_run)
            .field("guarded", &self.guard.is_some())
            .finish_non_exhaustive()
    }
}

/// What happened to a stage during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Executed,
    /// The guard returned false.
    Skipped,
    UpToDate,
}

/// Stage outcomes in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: Vec<(String, StageOutcome)>,
}

impl RunReport {
    pub fn outcome(&self, stage: &str) -> Option<StageOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == stage)
            .map(|(_, outcome)| *outcome)
    }

    pub fn count(&self, outcome: StageOutcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }
}

/// A set of stages forming a directed acyclic graph.
#[derive(Default)]
pub struct Pipeline {
    stages: BTreeMap<String, Stage>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stages.values()).finish()
    }
}

/// Three-color marking for the planning DFS.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage to the graph.
    ///
    /// Dependencies that are not registered yet are accepted and checked when
    /// the graph is planned.
    ///
    /// # Errors
    /// Returns [`EngineError::DuplicateStage`] if the name is taken, or
    /// [`EngineError::StageCycle`] if the stage depends on itself directly or
    /// through already registered stages.
    pub fn register(&mut self, stage: Stage) -> Result<(), EngineError> {
        if self.stages.contains_key(&stage.name) {
            return Err(EngineError::DuplicateStage { name: stage.name });
        }

        for dependency in &stage.dependencies {
            let mut path = vec![stage.name.clone()];
            let mut seen = BTreeSet::new();
            if self.reaches(dependency, &stage.name, &mut path, &mut seen) {
                return Err(EngineError::StageCycle {
                    cycle: path.join(" -> "),
                });
            }
        }

        log::debug!(
            "registered stage `{}` (depends on: {:?})",
            stage.name,
            stage.dependencies
        );
        self.stages.insert(stage.name.clone(), stage);
        Ok(())
    }

    /// Whether a path leads from `current` to `target`. On success `path`
    /// holds the full walk, `target` included.
    fn reaches(
        &self,
        current: &str,
        target: &str,
        path: &mut Vec<String>,
        seen: &mut BTreeSet<String>,
    ) -> bool {
        path.push(current.to_owned());
        if current == target {
            return true;
        }
        if seen.insert(current.to_owned()) {
            if let Some(stage) = self.stages.get(current) {
                for next in &stage.dependencies {
                    if self.reaches(next, target, path, seen) {
                        return true;
                    }
                }
            }
        }
        path.pop();
        false
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Stage> {
        self.stages.get(name)
    }

    /// Registered stages, sorted by name.
    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.values()
    }

    /// The transitive dependency closure of `target`, dependencies first.
    ///
    /// Siblings are visited in name order, so the plan is deterministic.
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownStage`] if `target` or any dependency is
    /// not registered, or [`EngineError::StageCycle`] for a cycle introduced
    /// through forward references.
    pub fn plan(&self, target: &str) -> Result<Vec<String>, EngineError> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut order = Vec::new();
        let mut stack = Vec::new();
        self.visit(target, None, &mut marks, &mut stack, &mut order)?;
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        required_by: Option<&str>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => {
                stack.push(name);
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let cycle = stack.get(start..).unwrap_or(stack.as_slice()).join(" -> ");
                return Err(EngineError::StageCycle { cycle });
            }
            None => {}
        }

        let Some((key, stage)) = self.stages.get_key_value(name) else {
            return Err(EngineError::UnknownStage {
                name: name.to_owned(),
                required_by: required_by.map(str::to_owned),
            });
        };

        marks.insert(key.as_str(), Mark::InProgress);
        stack.push(key.as_str());
        for dependency in &stage.dependencies {
            self.visit(dependency, Some(key.as_str()), marks, stack, order)?;
        }
        stack.pop();
        marks.insert(key.as_str(), Mark::Done);
        order.push(key.clone());
        Ok(())
    }

    /// Execute `target` and everything it depends on, each stage at most once.
    ///
    /// # Errors
    /// Planning errors are returned before any stage runs. A failing action
    /// halts the run with [`EngineError::StageFailed`] naming the stage.
    pub fn run(&mut self, target: &str) -> Result<RunReport, EngineError> {
        let plan = self.plan(target)?;
        log::info!("running `{target}` ({} stages)", plan.len());

        let mut report = RunReport::default();
        for name in plan {
            let Some(stage) = self.stages.get_mut(&name) else {
                return Err(EngineError::UnknownStage {
                    name,
                    required_by: Some(target.to_owned()),
                });
            };

            if let Some(guard) = &stage.guard {
                if !guard() {
                    log::info!("skipping `{name}`: condition not met");
                    report.outcomes.push((name, StageOutcome::Skipped));
                    continue;
                }
            }

            if !stage.always_run && stage.up_to_date.as_ref().is_some_and(|check| check()) {
                log::info!("`{name}` is up to date");
                report.outcomes.push((name, StageOutcome::UpToDate));
                continue;
            }

            log::info!("> {name}");
            if let Err(source) = (stage.action)() {
                log::error!("stage `{name}` failed: {source}");
                return Err(EngineError::StageFailed {
                    stage: name,
                    source: Box::new(source),
                });
            }
            report.outcomes.push((name, StageOutcome::Executed));
        }
        Ok(report)
    }
}


#[cfg(test)]
mod proptests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{Pipeline, Stage};

    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    proptest! {
        /// Random DAGs (edges only point to lower indices) must run every
        /// stage once, dependencies first.
        #[test]
        fn random_dag_respects_edges(
            edges in proptest::collection::vec((1usize..12, 0usize..12), 0..40),
        ) {
            let log = Rc::new(RefCell::new(Vec::<usize>::new()));
            let mut deps: Vec<Vec<usize>> = vec![Vec::new(); 12];
            for (from, to) in edges {
                if to < from {
                    if let Some(list) = deps.get_mut(from) {
                        list.push(to);
                    }
                }
            }

            let mut pipeline = Pipeline::new();
            for (index, targets) in deps.iter().enumerate() {
                let recorder = Rc::clone(&log);
                let stage = Stage::new(&format!("s{index}"), move || {
                    recorder.borrow_mut().push(index);
                    Ok(())
                })
                .depends_on_all(targets.iter().map(|t| format!("s{t}")));
                prop_assert!(pipeline.register(stage).is_ok());
            }
            let all = Stage::new("all", || Ok(())).depends_on_all((0..12).map(|i| format!("s{i}")));
            prop_assert!(pipeline.register(all).is_ok());
            prop_assert!(pipeline.run("all").is_ok());

            let order = log.borrow();
            prop_assert_eq!(order.len(), 12);
            for (index, targets) in deps.iter().enumerate() {
                let at = order.iter().position(|n| *n == index);
                for target in targets {
                    let dep_at = order.iter().position(|n| n == target);
                    prop_assert!(dep_at < at);
                }
            }
        }
    }
}
