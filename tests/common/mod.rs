// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides script builders, temp environments and an in-memory run helper

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::fs;

use lockstep::engine::{ExecutionError, RunResult, ScriptRunner};
use lockstep::output::MemoryEmitter;
use lockstep::parser::Script;
use lockstep::template::Session;
use lockstep::StdioPrompter;

pub struct TestScriptBuilder {
    name: String,
    description: String,
    session: Vec<(String, String)>,
    steps: Vec<String>,
    output: Option<String>,
}

impl TestScriptBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Test script: {}", name),
            session: Vec::new(),
            steps: Vec::new(),
            output: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// `value` is inline YAML, e.g. `[Al, Bo]`
    pub fn with_session(mut self, key: &str, value: &str) -> Self {
        self.session.push((key.to_string(), value.to_string()));
        self
    }

    /// `step` is the inline YAML of one step, e.g. `csv: [name, amount]`
    pub fn with_step(mut self, step: &str) -> Self {
        self.steps.push(step.to_string());
        self
    }

    pub fn with_output_file(mut self, path: &Path) -> Self {
        self.output = Some(format!("file://{}", path.display()));
        self
    }

    pub fn generate_yaml(&self) -> String {
        let mut yaml = format!(
            "name: {}\ndescription: \"{}\"\n\n",
            self.name, self.description
        );

        if !self.session.is_empty() {
            yaml.push_str("session:\n");
            for (key, value) in &self.session {
                yaml.push_str(&format!("  {}: {}\n", key, value));
            }
            yaml.push('\n');
        }

        yaml.push_str("steps:\n");
        for step in &self.steps {
            yaml.push_str(&format!("  - {}\n", step));
        }

        if let Some(output) = &self.output {
            yaml.push_str(&format!("\noutput:\n  default: \"{}\"\n", output));
        }

        yaml
    }

    pub fn build(&self) -> Script {
        Script::from_yaml(&self.generate_yaml()).expect("Failed to parse generated script")
    }

    pub async fn write_to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        fs::write(path, self.generate_yaml()).await?;
        Ok(())
    }
}

pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn script_file(&self, name: &str) -> PathBuf {
        self.path().join(format!("{}.yaml", name))
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    pub async fn create_script_file(&self, name: &str, builder: &TestScriptBuilder) -> PathBuf {
        let script_file = self.script_file(name);
        builder
            .write_to_file(&script_file)
            .await
            .expect("Failed to write script file");
        script_file
    }
}

pub struct ScriptRun {
    pub result: Result<RunResult, ExecutionError>,
    pub emitter: MemoryEmitter,
    pub session: Session,
    pub transcript: String,
}

/// Run a script in memory, answering prompts from `input`
pub fn run_in_memory(script: &Script, input: &str) -> ScriptRun {
    let runner = ScriptRunner::new();
    let mut session = ScriptRunner::session_for(script);
    let mut emitter = MemoryEmitter::new();
    let mut prompter = StdioPrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::<u8>::new());

    let result = runner.run(script, &mut session, &mut emitter, &mut prompter);
    ScriptRun {
        result,
        emitter,
        session,
        transcript: String::from_utf8_lossy(&prompter.into_writer()).to_string(),
    }
}

pub fn session(value: serde_json::Value) -> Session {
    Session::from_json(value).expect("Failed to build session")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_builder() {
        let builder = TestScriptBuilder::new("test_script")
            .with_description("Test script description")
            .with_session("name", "[Al, Bo]")
            .with_step("csv: [name]");

        let yaml = builder.generate_yaml();
        assert!(yaml.contains("name: test_script"));
        assert!(yaml.contains("  name: [Al, Bo]"));
        assert!(yaml.contains("  - csv: [name]"));
        assert_eq!(builder.build().steps.len(), 1);
    }

    #[test]
    fn test_environment_setup() {
        let env = TestEnvironment::new();
        assert!(env.path().exists());
        assert!(env.script_file("test").to_string_lossy().contains("test.yaml"));
    }
}
