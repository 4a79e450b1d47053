//! Subcommand implementations and the state they share.
//!
//! Every command reports failures through [`Ctx::fail`], which prints the
//! error in the selected format and exits with status 1.

pub(crate) mod check;
pub(crate) mod csv;
pub(crate) mod fields;
pub(crate) mod scenarios;
pub(crate) mod simulate;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use brms_api::{HttpRulesApi, InMemoryRulesApi, RuleDocument, RulesApi};
use brms_core::{RuleMap, Scenario};
use serde::Serialize;
use serde_json::Value;

use crate::config::BrmsConfig;
use crate::{report_error, OutputFormat};

pub(crate) struct Ctx {
    api: Box<dyn RulesApi>,
    pub config: BrmsConfig,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Ctx {
    pub fn new(config: BrmsConfig, offline: bool, output: OutputFormat, quiet: bool) -> Self {
        let api: Box<dyn RulesApi> = if offline {
            Box::new(InMemoryRulesApi::new())
        } else {
            Box::new(HttpRulesApi::new(config.http_config()))
        };
        Ctx {
            api,
            config,
            output,
            quiet,
        }
    }

    pub fn api(&self) -> &dyn RulesApi {
        self.api.as_ref()
    }

    pub fn fail(&self, msg: &str) -> ! {
        report_error(msg, self.output, self.quiet);
        process::exit(1);
    }

    pub fn is_json(&self) -> bool {
        self.output == OutputFormat::Json
    }

    /// Print a line of human-readable output unless quiet or in JSON mode.
    pub fn say(&self, line: &str) {
        if !self.quiet && !self.is_json() {
            println!("{}", line);
        }
    }

    pub fn print_json<T: Serialize>(&self, value: &T) {
        let text = serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
        println!("{}", text);
    }

    pub fn read_text(&self, path: &Path) -> String {
        std::fs::read_to_string(path)
            .unwrap_or_else(|e| self.fail(&format!("error reading '{}': {}", path.display(), e)))
    }

    pub fn read_json(&self, path: &Path) -> Value {
        let text = self.read_text(path);
        serde_json::from_str(&text)
            .unwrap_or_else(|e| self.fail(&format!("error: invalid JSON in {}: {}", path.display(), e)))
    }

    /// Read a rule file. Its path relative to the rules directory is the
    /// filepath the service knows it by.
    pub fn load_rule(&self, path: &Path) -> RuleDocument {
        let content = self.read_json(path);
        if !content.is_object() {
            self.fail(&format!("error: {} is not a JDM decision graph", path.display()));
        }
        let filepath = rule_filepath(path, Path::new(&self.config.rules.rule_dir));
        let rule_id = content
            .get("_id")
            .or_else(|| content.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| filepath.clone());
        RuleDocument::new(rule_id, filepath, content)
    }

    pub async fn rule_map(&self, rule: &RuleDocument) -> RuleMap {
        self.api()
            .get_rule_map(&rule.filepath, &rule.content)
            .await
            .unwrap_or_else(|e| self.fail(&format!("failed to load rule map: {}", e)))
    }

    pub async fn scenarios(&self, rule: &RuleDocument) -> Vec<Scenario> {
        self.api()
            .list_scenarios(&rule.filepath)
            .await
            .unwrap_or_else(|e| self.fail(&format!("failed to load scenarios: {}", e)))
    }

    /// Write `text` to `out`, or to stdout when no file is given.
    pub fn emit(&self, out: Option<&Path>, text: &str) {
        match out {
            Some(path) => {
                std::fs::write(path, text).unwrap_or_else(|e| {
                    self.fail(&format!("error writing '{}': {}", path.display(), e))
                });
                self.say(&format!("wrote {}", path.display()));
            }
            None => print!("{}", text),
        }
    }

    /// Ask for confirmation on stderr; `yes` skips the prompt.
    pub fn confirm(&self, prompt: &str, yes: bool) -> bool {
        if yes {
            return true;
        }
        eprintln!("{}", prompt);
        eprint!("Type 'yes' to continue: ");
        let _ = std::io::stderr().flush();
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).is_ok() && input.trim() == "yes"
    }
}

/// Path of `path` relative to `rule_dir` with `/` separators, or `path`
/// itself when it lies outside the rules directory.
pub(crate) fn rule_filepath(path: &Path, rule_dir: &Path) -> String {
    let relative: PathBuf = path
        .strip_prefix(rule_dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf());
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
