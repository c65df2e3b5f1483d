//! Recursive include expansion with variable substitution.

use std::fs;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::directive::{find_directives, ParseError};

/// Options controlling include expansion.
#[derive(Debug, Clone)]
pub struct IncludeOptions {
    /// Token that starts a directive or variable (e.g. `@@`)
    pub prefix: String,

    /// Directory include paths are resolved against
    pub basepath: PathBuf,
}

impl Default for IncludeOptions {
    fn default() -> Self {
        Self {
            prefix: "@@".to_string(),
            basepath: PathBuf::from("src/components"),
        }
    }
}

/// Errors that can occur while expanding includes.
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Include cycle through {0}")]
    Cycle(PathBuf),

    #[error("Invalid include prefix: {0}")]
    Prefix(#[from] regex::Error),
}

/// Expands include directives in markup sources.
#[derive(Debug, Clone)]
pub struct Resolver {
    options: IncludeOptions,
    variable: Regex,
}

impl Resolver {
    /// Create a resolver for the given options.
    pub fn new(options: IncludeOptions) -> Result<Self, IncludeError> {
        let variable = Regex::new(&format!(
            r"{}([A-Za-z_][A-Za-z0-9_.]*)",
            regex::escape(&options.prefix)
        ))?;

        Ok(Self { options, variable })
    }

    /// The options this resolver was built with.
    pub fn options(&self) -> &IncludeOptions {
        &self.options
    }

    /// Read and expand a page.
    pub fn render_file(&self, path: &Path) -> Result<String, IncludeError> {
        let source = read(path)?;
        self.render(&source, path)
    }

    /// Expand `source`, which was read from `origin`.
    pub fn render(&self, source: &str, origin: &Path) -> Result<String, IncludeError> {
        let mut stack = vec![identity(origin)];
        self.expand(source, origin, &Value::Object(Map::new()), &mut stack)
    }

    fn expand(
        &self,
        source: &str,
        origin: &Path,
        context: &Value,
        stack: &mut Vec<PathBuf>,
    ) -> Result<String, IncludeError> {
        let source = self.substitute(source, context);
        let directives =
            find_directives(&source, &self.options.prefix).map_err(|e| IncludeError::Parse {
                path: origin.to_path_buf(),
                source: e,
            })?;

        if directives.is_empty() {
            return Ok(source);
        }

        let mut output = String::with_capacity(source.len());
        let mut last = 0;

        for directive in directives {
            output.push_str(&source[last..directive.start]);

            let target = self.options.basepath.join(&directive.path);
            let id = identity(&target);
            if stack.contains(&id) {
                return Err(IncludeError::Cycle(target));
            }

            let child_context = merge(context, directive.context.as_ref());
            let fragment = read(&target)?;

            stack.push(id);
            let rendered = self.expand(&fragment, &target, &child_context, stack)?;
            stack.pop();

            output.push_str(&rendered);
            last = directive.end;
        }

        output.push_str(&source[last..]);
        Ok(output)
    }

    /// Replace `@@name` references that resolve in `context`. Unknown names are left alone.
    fn substitute(&self, source: &str, context: &Value) -> String {
        self.variable
            .replace_all(source, |caps: &Captures| {
                let raw = &caps[1];
                let name = raw.trim_end_matches('.');
                match lookup(context, name) {
                    Some(value) => format!("{}{}", render_value(value), &raw[name.len()..]),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn read(path: &Path) -> Result<String, IncludeError> {
    fs::read_to_string(path).map_err(|e| IncludeError::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

fn identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Child context: the parent's keys overridden by the directive's own.
fn merge(parent: &Value, own: Option<&Value>) -> Value {
    let mut merged = match parent {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if let Some(Value::Object(map)) = own {
        for (key, value) in map {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

fn lookup<'v>(context: &'v Value, name: &str) -> Option<&'v Value> {
    if name.is_empty() {
        return None;
    }
    name.split('.')
        .try_fold(context, |value, key| value.as_object()?.get(key))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
