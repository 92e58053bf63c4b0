// ABOUTME: Script runner executing steps in order against one session
// ABOUTME: Dispatches each step to its action and records a run result

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{ExecutionError, Result};
use super::result::{RunResult, StepResult, StepStatus};
use crate::actions::{ActionContext, ActionRegistry, Prompter};
use crate::output::Emitter;
use crate::parser::{Script, Step};
use crate::template::{Interpolator, Session};

pub struct ScriptRunner {
    registry: ActionRegistry,
    interpolator: Interpolator,
    continue_on_error: bool,
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self {
            registry: ActionRegistry::new(),
            interpolator: Interpolator::new(),
            continue_on_error: false,
        }
    }

    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_interpolator(mut self, interpolator: Interpolator) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// Record failing steps and keep going instead of stopping the run
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn interpolator(&self) -> &Interpolator {
        &self.interpolator
    }

    /// Initial session for a script
    pub fn session_for(script: &Script) -> Session {
        let mut session = Session::new();
        session.extend(script.session.clone());
        session
    }

    /// Run every step of `script`. The session is left holding whatever the
    /// steps stored in it.
    pub fn run(
        &self,
        script: &Script,
        session: &mut Session,
        emitter: &mut dyn Emitter,
        prompter: &mut dyn Prompter,
    ) -> Result<RunResult> {
        let steps = script.normalized_steps()?;
        let run_id = Uuid::new_v4().to_string();
        let mut result = RunResult::new(script.name.clone(), run_id.clone());

        info!(
            "Starting script '{}' (run {}) with {} steps",
            script.name,
            run_id,
            steps.len()
        );

        let outcome = self.run_steps(&steps, session, emitter, prompter, &mut result);
        let flushed = emitter.flush();
        outcome?;
        flushed?;

        result.mark_completed();
        info!(
            "Script '{}' finished: {:?}, {} steps, {} lines",
            script.name,
            result.status,
            result.steps_executed(),
            result.lines_emitted
        );
        Ok(result)
    }

    fn run_steps(
        &self,
        steps: &[Step],
        session: &mut Session,
        emitter: &mut dyn Emitter,
        prompter: &mut dyn Prompter,
        result: &mut RunResult,
    ) -> Result<()> {
        for step in steps {
            let mut step_result =
                StepResult::new(step.index, step.action.clone(), step.label());
            step_result.mark_started();
            debug!("Executing step {}", step.label());

            let mut context = ActionContext::new(session, &self.interpolator, emitter, prompter)
                .with_channel(step.channel.clone());
            let outcome = self
                .registry
                .execute_action(&step.action, &step.config, &mut context);
            let lines = context.lines_emitted();

            match outcome {
                Ok(()) => {
                    step_result.mark_completed(StepStatus::Success, lines, None);
                    result.add_step_result(step_result);
                }
                Err(e) => {
                    error!("Step {} failed: {}", step.label(), e);
                    step_result.mark_completed(StepStatus::Failed, lines, Some(e.to_string()));
                    result.add_step_result(step_result);

                    if !self.continue_on_error {
                        return Err(ExecutionError::StepFailed {
                            step: step.index,
                            action: step.action.clone(),
                            source: Box::new(e),
                        });
                    }
                    warn!("Continuing after failure in step {}", step.label());
                }
            }
        }
        Ok(())
    }
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::StdioPrompter;
    use crate::engine::result::RunStatus;
    use crate::output::MemoryEmitter;
    use crate::template::{TemplateError, Value};
    use std::io::Cursor;

    fn prompter(input: &str) -> StdioPrompter<Cursor<Vec<u8>>, Vec<u8>> {
        StdioPrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_run_steps_share_session() {
        let script = Script::from_yaml(
            r#"
name: greet
session:
  names: [Al, Bo]
steps:
  - prompt: {greeting: Greeting}
  - set: {count: "<% names | length %>"}
  - emit: "<% greeting %> x<% count %>"
  - csv: [names]
    channel: rows
"#,
        )
        .unwrap();

        let runner = ScriptRunner::new();
        let mut session = ScriptRunner::session_for(&script);
        let mut emitter = MemoryEmitter::new();
        let mut input = prompter("Hi\n");

        let result = runner
            .run(&script, &mut session, &mut emitter, &mut input)
            .unwrap();

        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.steps_executed(), 4);
        assert_eq!(result.lines_emitted, 3);
        assert_eq!(emitter.lines(), vec!["Hi x2", "Al", "Bo"]);
        assert_eq!(emitter.channel_lines("rows"), vec!["Al", "Bo"]);
        assert_eq!(session.get("count"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_failure_carries_step_index() {
        let script =
            Script::from_yaml("name: fail\nsteps:\n  - emit: ok\n  - emit: '<% missing %>'\n  - emit: never\n")
                .unwrap();
        let runner = ScriptRunner::new();
        let mut session = ScriptRunner::session_for(&script);
        let mut emitter = MemoryEmitter::new();

        let err = runner
            .run(&script, &mut session, &mut emitter, &mut prompter(""))
            .unwrap_err();
        match &err {
            ExecutionError::StepFailed { step, action, .. } => {
                assert_eq!(*step, 1);
                assert_eq!(action, "emit");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(matches!(
            err.template_error(),
            Some(TemplateError::PathResolutionError { .. })
        ));
        assert_eq!(emitter.lines(), vec!["ok"]);
    }

    #[test]
    fn test_continue_on_error() {
        let script = Script::from_yaml(
            "name: partial\nsteps:\n  - emit: '<% missing %>'\n  - emit: after\n",
        )
        .unwrap();
        let runner = ScriptRunner::new().with_continue_on_error(true);
        let mut session = Session::new();
        let mut emitter = MemoryEmitter::new();

        let result = runner
            .run(&script, &mut session, &mut emitter, &mut prompter(""))
            .unwrap();
        assert_eq!(result.status, RunStatus::PartialSuccess);
        assert_eq!(result.failed_steps(), 1);
        assert_eq!(emitter.lines(), vec!["after"]);
    }

    #[test]
    fn test_unknown_action_fails_at_run_time() {
        let script = Script::from_yaml("name: odd\nsteps:\n  - launch: rockets\n").unwrap();
        let runner = ScriptRunner::new();
        let mut session = Session::new();
        let mut emitter = MemoryEmitter::new();

        let err = runner
            .run(&script, &mut session, &mut emitter, &mut prompter(""))
            .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ExecutionError::ActionNotSupported { .. }
        ));
    }
}
