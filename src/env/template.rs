//! Script templates
//!
//! Templates are embedded in the binary and may be overridden by files in
//! `<home>/templates/<name>.tmpl`. Every provider template imports the
//! `helpers` template, which is always loaded first. Templates see these
//! globals besides their data:
//!
//! - `shell`: name of the target shell
//! - `shellEscape(value, ...)`: quote values (or lists of values) for the shell
//! - `evalCmd(cmd)`: the shell's idiom for evaluating the output of `cmd`
//!
//! The minijinja builtins `dict()` and `|replace` are available as well.

use super::Shell;
use crate::error::{GctlError, Result};
use minijinja::value::{Rest, Value, ValueKind};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use rust_embed::Embed;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Embed)]
#[folder = "src/env/templates/"]
struct Embedded;

pub const HELPERS: &str = "helpers";

pub struct Template {
    env: Environment<'static>,
}

impl Template {
    /// An empty template set for `shell`
    pub fn new(shell: Shell) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);

        env.add_global("shell", shell.as_str());
        env.add_function("shellEscape", move |values: Rest<Value>| shell_escape(shell, &values));
        env.add_function("evalCmd", move |cmd: String| shell.eval_command(&cmd));

        Template { env }
    }

    /// Templates for `name` with the helpers already loaded
    pub fn for_name(shell: Shell, name: &str, override_dir: Option<&Path>) -> Result<Self> {
        let mut template = Template::new(shell);
        template.load(HELPERS, override_dir)?;
        template.load(name, override_dir)?;
        Ok(template)
    }

    /// Register the embedded template `name`, replaced by a user file when one exists
    pub fn load(&mut self, name: &str, override_dir: Option<&Path>) -> Result<()> {
        let file_name = format!("{name}.tmpl");

        let user_source = match override_dir.map(|dir| dir.join(&file_name)) {
            Some(path) => match fs::read_to_string(&path) {
                Ok(source) => {
                    debug!(path = %path.display(), "Using custom template");
                    Some(source)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    return Err(GctlError::Template(format!("reading template {name:?} failed: {e}")));
                }
            },
            None => None,
        };

        let source = match user_source {
            Some(source) => source,
            None => {
                let file = Embedded::get(&file_name)
                    .ok_or_else(|| GctlError::Template(format!("template {name:?} does not exist")))?;
                String::from_utf8(file.data.into_owned())
                    .map_err(|e| GctlError::Template(format!("template {name:?} is not valid UTF-8: {e}")))?
            }
        };

        self.env
            .add_template_owned(name.to_string(), source)
            .map_err(|e| GctlError::Template(format!("parsing template {name:?} failed: {e}")))
    }

    pub fn render<S: Serialize>(&self, name: &str, data: &S) -> Result<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(Value::from_serialize(data))?)
    }
}

fn shell_escape(shell: Shell, values: &[Value]) -> String {
    let mut flat = Vec::new();
    for value in values {
        match value.kind() {
            ValueKind::Undefined | ValueKind::None => {}
            ValueKind::Seq => {
                if let Ok(items) = value.try_iter() {
                    flat.extend(items.filter(|v| !v.is_none() && !v.is_undefined()).map(display));
                }
            }
            _ => flat.push(display(value.clone())),
        }
    }
    shell.escape(&flat)
}

fn display(value: Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn render_str(shell: Shell, source: &str, data: serde_json::Value) -> String {
        let mut t = Template::new(shell);
        t.env.add_template_owned("t", source.to_string()).unwrap();
        t.render("t", &data).unwrap()
    }

    #[test]
    fn test_shell_escape_function() {
        let out = render_str(Shell::Bash, "{{ shellEscape(a, b) }}", json!({"a": "x y", "b": "it's"}));
        assert_eq!(out, r#"'x y' 'it'"'"'s'"#);

        let out = render_str(Shell::Powershell, "{{ shellEscape(lines) }}", json!({"lines": ["a", "b'"]}));
        assert_eq!(out, "'a' 'b'''");
    }

    #[test]
    fn test_eval_cmd_and_shell_global() {
        let out = render_str(Shell::Fish, "{{ shell }}: {{ evalCmd('gardenctl provider-env fish') }}", json!({}));
        assert_eq!(out, "fish: eval (gardenctl provider-env fish)");
    }

    #[test]
    fn test_strict_undefined() {
        let mut t = Template::new(Shell::Bash);
        t.env.add_template_owned("t", "{{ missing.field }}".to_string()).unwrap();
        assert!(t.render("t", &json!({})).is_err());
    }

    #[test]
    fn test_unknown_template() {
        let err = Template::for_name(Shell::Bash, "nope", None).err().unwrap();
        assert_eq!(err.to_string(), "Template error: template \"nope\" does not exist");
    }

    #[test]
    fn test_user_override() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("test.tmpl"),
            "{% import \"helpers\" as h %}\n{{ h.export_value(\"TEST_TOKEN\", token) }}\n",
        )
        .unwrap();

        let t = Template::for_name(Shell::Bash, "test", Some(dir.path())).unwrap();
        let out = t.render("test", &json!({"token": "abc"})).unwrap();
        assert_eq!(out, "export TEST_TOKEN='abc';\n");
    }

    #[test]
    fn test_invalid_user_template() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.tmpl"), "{% if %}").unwrap();
        let err = Template::for_name(Shell::Bash, "broken", Some(dir.path())).err().unwrap();
        assert!(err.to_string().contains("parsing template \"broken\" failed"));
    }
}
