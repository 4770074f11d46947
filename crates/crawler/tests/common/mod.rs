//! Shared fixtures for crawler integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use librecores_crawler::markup::HtmlMarkupConverter;
use librecores_crawler::process::{ProcessOutput, ProcessRunner, ProcessSpec};
use librecores_crawler::{CrawlerConfig, RepoCrawlerFactory, Result};
use librecores_database::*;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const CLOC_JSON: &str = r#"{"header":{"n_files":3},"SUM":{"code":100,"blank":10,"comment":5},"Verilog":{"nFiles":2,"code":80,"blank":8,"comment":4},"C":{"nFiles":1,"code":20,"blank":2,"comment":1}}"#;

pub const FULL_LOG: &str = "\
a1a1a1|Olof Kindgren|olof@award-winning.me|Mon, 21 May 2018 10:00:00 +0200

 2 files changed, 40 insertions(+)
b2b2b2|Stefan Wallentowitz|stefan@wallentowitz.de|Tue, 22 May 2018 11:00:00 +0200

 1 file changed, 3 insertions(+), 1 deletion(-)
c3c3c3|Olof Kindgren|olof@award-winning.me|Wed, 23 May 2018 12:00:00 +0200
";

/// Answers `git` and `cloc` invocations from a script
pub struct ScriptedRunner {
    state: Mutex<Script>,
}

#[derive(Clone)]
struct Script {
    clone_code: i32,
    clone_files: Vec<(String, Vec<u8>)>,
    ancestor_code: i32,
    full_log: String,
    incremental_log: String,
    cloc: String,
    calls: Vec<ProcessSpec>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(Script {
                clone_code: 0,
                clone_files: Vec::new(),
                ancestor_code: 0,
                full_log: FULL_LOG.to_string(),
                incremental_log: String::new(),
                cloc: CLOC_JSON.to_string(),
                calls: Vec::new(),
            }),
        })
    }

    pub fn with_file(self: &Arc<Self>, name: &str, content: &[u8]) -> Arc<Self> {
        self.state
            .lock()
            .unwrap()
            .clone_files
            .push((name.to_string(), content.to_vec()));
        Arc::clone(self)
    }

    pub fn set_clone_code(&self, code: i32) {
        self.state.lock().unwrap().clone_code = code;
    }

    pub fn set_ancestor_code(&self, code: i32) {
        self.state.lock().unwrap().ancestor_code = code;
    }

    pub fn set_full_log(&self, log: &str) {
        self.state.lock().unwrap().full_log = log.to_string();
    }

    pub fn set_incremental_log(&self, log: &str) {
        self.state.lock().unwrap().incremental_log = log.to_string();
    }

    /// Number of recorded invocations whose command line contains `needle`
    pub fn count_calls(&self, needle: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|spec| spec.command_line().contains(needle))
            .count()
    }

    pub fn calls(&self) -> Vec<ProcessSpec> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(spec.clone());

        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
        let output = match (spec.program.as_str(), args.first().copied()) {
            ("git", Some("clone")) => {
                if state.clone_code == 0 {
                    let dir = Path::new(args[2]);
                    for (name, content) in &state.clone_files {
                        std::fs::write(dir.join(name), content)?;
                    }
                }
                exit(state.clone_code, "", "fatal: repository not found")
            }
            ("git", Some("merge-base")) => exit(state.ancestor_code, "", "fatal: merge-base failed"),
            ("git", Some("log")) => {
                let incremental = args.last().is_some_and(|arg| arg.ends_with("..."));
                let log = if incremental {
                    &state.incremental_log
                } else {
                    &state.full_log
                };
                exit(0, log, "")
            }
            ("cloc", _) => exit(0, &state.cloc, ""),
            _ => exit(127, "", "command not found"),
        };

        Ok(output)
    }
}

fn exit(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

pub fn test_config() -> CrawlerConfig {
    CrawlerConfig {
        github_token: None,
        github_api_url: "http://127.0.0.1:9".to_string(),
        webhook_url: None,
        git_command: "git".to_string(),
        cloc_command: "cloc".to_string(),
        ..Default::default()
    }
}

pub fn factory(db: &Database, runner: Arc<ScriptedRunner>, config: CrawlerConfig) -> RepoCrawlerFactory {
    RepoCrawlerFactory::new(db.clone(), runner, Arc::new(HtmlMarkupConverter), config).unwrap()
}

pub async fn project_with_repo(db: &Database, url: &str) -> (Project, SourceRepo) {
    let project = db
        .create_project(NewProject {
            name: "openrisc/mor1kx".to_string(),
            description_text_auto_update: true,
            license_text_auto_update: true,
        })
        .await
        .unwrap();
    let repo = db
        .create_source_repo(NewSourceRepo {
            project_id: Some(project.id),
            repo_type: REPO_TYPE_GIT.to_string(),
            url: url.to_string(),
            web_view_url: None,
        })
        .await
        .unwrap();
    (project, repo)
}
