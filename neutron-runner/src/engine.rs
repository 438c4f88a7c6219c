//! Step engine
//!
//! Runs the steps of one task in order. Every step is first reported
//! pending, then each is started, executed and reported in turn. The first
//! failure marks the current step and every later one failed in the same
//! forward pass; nothing runs after it.

use anyhow::Result;
use neutron_core::domain::pipeline::{PipelineManifest, Step};
use neutron_core::domain::step::StepResult;
use neutron_core::domain::trigger::TriggerKind;
use tracing::{error, info, warn};

use crate::executor::CommandExecutor;
use crate::reporter::StatusReporter;

pub const CREATED: &str = "pipeline created.";
pub const STARTED: &str = "pipeline started.";
pub const FINISHED: &str = "pipeline finished.";
pub const FAILED: &str = "pipeline failed.";
pub const BAD_COMMAND: &str = "wrong command format.";

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The task does not run for this trigger
    Skipped,
    Succeeded,
    /// `step` is the first step that failed
    Failed { step: String },
}

impl Outcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Skipped | Outcome::Succeeded => 0,
            Outcome::Failed { .. } => 1,
        }
    }
}

pub struct Engine<'a> {
    reporter: &'a dyn StatusReporter,
    executor: &'a dyn CommandExecutor,
}

impl<'a> Engine<'a> {
    pub fn new(reporter: &'a dyn StatusReporter, executor: &'a dyn CommandExecutor) -> Self {
        Self { reporter, executor }
    }

    /// Run `task_name` from `manifest` for `trigger`.
    ///
    /// A task missing from the manifest is an error: the job was built for
    /// a manifest this checkout does not contain.
    pub async fn run(&self, manifest: &PipelineManifest, task_name: &str, trigger: TriggerKind) -> Result<Outcome> {
        let Some(task) = manifest.task(task_name) else {
            anyhow::bail!("Task '{}' is not defined in the pipeline manifest", task_name);
        };

        if !task.accepts(trigger) {
            info!("Task {} does not run for {}, skipping", task_name, trigger);
            self.reporter
                .report("", StepResult::Success, &format!("Current job skipped in {}.", trigger))
                .await;
            return Ok(Outcome::Skipped);
        }

        Ok(self.execute(&task.steps).await)
    }

    async fn execute(&self, steps: &[Step]) -> Outcome {
        for step in steps {
            self.reporter.report(&step.name, StepResult::Pending, CREATED).await;
        }

        let mut failed: Option<String> = None;

        for step in steps {
            if failed.is_some() {
                self.reporter.report(&step.name, StepResult::Fail, FAILED).await;
                continue;
            }

            self.reporter.report(&step.name, StepResult::Running, STARTED).await;
            info!("Running step {}: {}", step.name, step.cmd);

            let description = match self.run_step(step).await {
                Ok(()) => {
                    self.reporter.report(&step.name, StepResult::Success, FINISHED).await;
                    continue;
                }
                Err(description) => description,
            };

            self.reporter.report(&step.name, StepResult::Fail, description).await;
            failed = Some(step.name.clone());
        }

        match failed {
            Some(step) => Outcome::Failed { step },
            None => Outcome::Succeeded,
        }
    }

    /// Run one step; on failure returns the description to report
    async fn run_step(&self, step: &Step) -> std::result::Result<(), &'static str> {
        let argv = match shell_words::split(&step.cmd) {
            Ok(argv) if !argv.is_empty() => argv,
            Ok(_) => {
                error!("Step {} has an empty command", step.name);
                return Err(BAD_COMMAND);
            }
            Err(e) => {
                error!("Step {} has an unparsable command: {}", step.name, e);
                return Err(BAD_COMMAND);
            }
        };

        match self.executor.execute(&argv[0], &argv[1..]).await {
            Ok(0) => Ok(()),
            Ok(code) => {
                warn!("Step {} exited with code {}", step.name, code);
                Err(FAILED)
            }
            Err(e) => {
                error!("Step {} could not be started: {:#}", step.name, e);
                Err(FAILED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        reports: Mutex<Vec<(String, StepResult, String)>>,
    }

    impl RecordingReporter {
        fn results_for(&self, step: &str) -> Vec<StepResult> {
            self.reports
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _, _)| s == step)
                .map(|(_, r, _)| *r)
                .collect()
        }

        fn all(&self) -> Vec<(String, StepResult, String)> {
            self.reports.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatusReporter for RecordingReporter {
        async fn report(&self, step: &str, result: StepResult, description: &str) {
            let mut reports = self.reports.lock().unwrap();
            if let Some((_, previous, _)) = reports.iter().rev().find(|(s, _, _)| s == step) {
                assert!(
                    previous.can_advance_to(result),
                    "step {} moved backwards: {} -> {}",
                    step,
                    previous,
                    result
                );
            }
            reports.push((step.to_string(), result, description.to_string()));
        }
    }

    /// Exit codes by program name; anything unscripted succeeds
    #[derive(Default)]
    struct ScriptedExecutor {
        codes: HashMap<String, i32>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedExecutor {
        fn failing(program: &str, code: i32) -> Self {
            Self {
                codes: HashMap::from([(program.to_string(), code)]),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn execute(&self, program: &str, args: &[String]) -> Result<i32> {
            let mut argv = vec![program.to_string()];
            argv.extend(args.iter().cloned());
            self.calls.lock().unwrap().push(argv);
            Ok(self.codes.get(program).copied().unwrap_or(0))
        }
    }

    fn manifest(trigger: &str, cmds: &[(&str, &str)]) -> PipelineManifest {
        let steps: Vec<String> = cmds
            .iter()
            .map(|(name, cmd)| format!("      - name: {}\n        cmd: '{}'\n", name, cmd))
            .collect();
        PipelineManifest::from_yaml(&format!(
            "jobs:\n  build:\n    image: alpine\n    trigger: [{}]\n    steps:\n{}",
            trigger,
            steps.concat()
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let reporter = RecordingReporter::default();
        let executor = ScriptedExecutor::default();
        let m = manifest("PUSH", &[("a", "echo a"), ("b", "echo b")]);

        let outcome = Engine::new(&reporter, &executor)
            .run(&m, "build", TriggerKind::Push)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Succeeded);
        assert_eq!(outcome.exit_code(), 0);
        for step in ["a", "b"] {
            assert_eq!(
                reporter.results_for(step),
                vec![StepResult::Pending, StepResult::Running, StepResult::Success]
            );
        }
    }

    #[tokio::test]
    async fn test_pending_reported_for_every_step_first() {
        let reporter = RecordingReporter::default();
        let executor = ScriptedExecutor::default();
        let m = manifest("PUSH", &[("a", "echo a"), ("b", "echo b"), ("c", "echo c")]);

        Engine::new(&reporter, &executor)
            .run(&m, "build", TriggerKind::Push)
            .await
            .unwrap();

        let first: Vec<_> = reporter.all().into_iter().take(3).collect();
        assert!(first.iter().all(|(_, r, d)| *r == StepResult::Pending && d == CREATED));
    }

    #[tokio::test]
    async fn test_failure_cascades_to_later_steps() {
        let reporter = RecordingReporter::default();
        let executor = ScriptedExecutor::failing("make", 2);
        let m = manifest(
            "PUSH",
            &[("fetch", "echo a"), ("build", "make all"), ("test", "cargo test"), ("ship", "echo ship")],
        );

        let outcome = Engine::new(&reporter, &executor)
            .run(&m, "build", TriggerKind::Push)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Failed { step: "build".to_string() });
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(
            reporter.results_for("fetch"),
            vec![StepResult::Pending, StepResult::Running, StepResult::Success]
        );
        assert_eq!(
            reporter.results_for("build"),
            vec![StepResult::Pending, StepResult::Running, StepResult::Fail]
        );
        for later in ["test", "ship"] {
            assert_eq!(reporter.results_for(later), vec![StepResult::Pending, StepResult::Fail]);
        }
        assert_eq!(executor.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_push_scenario_second_step_fails() {
        let reporter = RecordingReporter::default();
        let executor = ScriptedExecutor::failing("exit", 1);
        let m = manifest("PUSH", &[("step1", "echo a"), ("step2", "exit 1")]);

        let outcome = Engine::new(&reporter, &executor)
            .run(&m, "build", TriggerKind::Push)
            .await
            .unwrap();

        assert_ne!(outcome.exit_code(), 0);
        assert_eq!(
            reporter.results_for("step1"),
            vec![StepResult::Pending, StepResult::Running, StepResult::Success]
        );
        assert_eq!(
            reporter.results_for("step2"),
            vec![StepResult::Pending, StepResult::Running, StepResult::Fail]
        );
    }

    #[tokio::test]
    async fn test_unparsable_command_fails_without_executing() {
        let reporter = RecordingReporter::default();
        let executor = ScriptedExecutor::default();
        let m = manifest("PUSH", &[("quote", r#"echo "unterminated"#), ("after", "echo after")]);

        let outcome = Engine::new(&reporter, &executor)
            .run(&m, "build", TriggerKind::Push)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Failed { step: "quote".to_string() });
        assert!(executor.calls().is_empty());
        let reports = reporter.all();
        assert!(reports.contains(&("quote".to_string(), StepResult::Fail, BAD_COMMAND.to_string())));
        assert_eq!(reporter.results_for("after"), vec![StepResult::Pending, StepResult::Fail]);
    }

    #[tokio::test]
    async fn test_quoted_arguments_are_kept_together() {
        let reporter = RecordingReporter::default();
        let executor = ScriptedExecutor::default();
        let m = manifest("PUSH", &[("greet", r#"echo "hello world" $HOME"#)]);

        Engine::new(&reporter, &executor)
            .run(&m, "build", TriggerKind::Push)
            .await
            .unwrap();

        assert_eq!(
            executor.calls(),
            vec![vec!["echo".to_string(), "hello world".to_string(), "$HOME".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_trigger_mismatch_reports_single_success() {
        let reporter = RecordingReporter::default();
        let executor = ScriptedExecutor::default();
        let m = manifest("TAG", &[("a", "echo a"), ("b", "echo b")]);

        let outcome = Engine::new(&reporter, &executor)
            .run(&m, "build", TriggerKind::Mr)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(
            reporter.all(),
            vec![(
                String::new(),
                StepResult::Success,
                "Current job skipped in MR.".to_string()
            )]
        );
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_task_is_fatal() {
        let reporter = RecordingReporter::default();
        let executor = ScriptedExecutor::default();
        let m = manifest("PUSH", &[("a", "echo a")]);

        let err = Engine::new(&reporter, &executor)
            .run(&m, "deploy", TriggerKind::Push)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("deploy"));
        assert!(reporter.all().is_empty());
    }
}
