//! Text templates for request fields.
//!
//! A template is literal text with `{{ ... }}` actions. An action is a
//! literal (`"text"`, `42`), a context field (`.name`) or a call to one of the
//! built-in functions, e.g. `{{ random_int 100 }}` or
//! `{{ base64_encode (random_alphanum 12) }}`. Function names and arity are
//! checked when the template is parsed; nothing is evaluated until
//! [`Template::execute`].
mod funcs;
mod parser;


use std::collections::BTreeMap;
use std::sync::Arc;

use rand::distributions::Distribution;
use rand::thread_rng;
use rand_regex::Regex as RandRegex;
use tracing::warn;

use crate::error::TemplateError;

use funcs::Func;

/// Variables visible to `.name` references.
pub type Context = BTreeMap<String, String>;

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Text(String),
    Action(Expr),
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Str(String),
    Int(i64),
    Field(String),
    Call { func: Func, args: Vec<Expr> },
    Regex(Arc<RandRegex>),
}

/// A parsed template, cheap to clone and safe to share between tasks.
#[derive(Debug, Clone)]
pub struct Template {
    source: Arc<str>,
    nodes: Arc<[Node]>,
}

impl Template {
    /// Parses `source` without evaluating any action.
    ///
    /// # Errors
    ///
    /// Returns an error for unclosed or empty actions, malformed literals,
    /// unknown functions, wrong argument counts and invalid regex patterns.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let nodes = parser::parse(source)?;
        Ok(Self {
            source: Arc::from(source),
            nodes: Arc::from(nodes),
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates every action and concatenates the output.
    ///
    /// # Errors
    ///
    /// Returns an error when a function rejects its arguments at runtime.
    pub fn execute(&self, context: Option<&Context>) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(self.source.len());
        for node in self.nodes.iter() {
            match node {
                Node::Text(text) => output.push_str(text),
                Node::Action(expr) => output.push_str(&eval(expr, context)?),
            }
        }
        Ok(output)
    }

    /// Like [`Template::execute`], but logs failures and renders them as an
    /// empty string.
    #[must_use]
    pub fn render(&self, context: Option<&Context>) -> String {
        match self.execute(context) {
            Ok(output) => output,
            Err(err) => {
                warn!("Error executing template {:?}: {}", self.source(), err);
                String::new()
            }
        }
    }
}

fn eval(expr: &Expr, context: Option<&Context>) -> Result<String, TemplateError> {
    match expr {
        Expr::Str(value) => Ok(value.clone()),
        Expr::Int(value) => Ok(value.to_string()),
        Expr::Field(name) => Ok(context
            .and_then(|vars| vars.get(name))
            .cloned()
            .unwrap_or_default()),
        Expr::Call { func, args } => {
            let values = args
                .iter()
                .map(|arg| eval(arg, context))
                .collect::<Result<Vec<_>, _>>()?;
            func.call(&values)
        }
        Expr::Regex(regex) => Ok(regex.sample(&mut thread_rng())),
    }
}
