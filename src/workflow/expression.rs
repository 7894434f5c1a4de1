//! Expression evaluation for transition conditions and condition nodes.
//!
//! The default [`JsExpressionEvaluator`] runs each expression in a fresh
//! QuickJS context. Every expression is screened against a denylist first,
//! then runs after a prelude that removes the code-generating constructors
//! and under an interrupt deadline.

use std::time::{Duration, Instant};

use regex::Regex;
use rquickjs::{Context as JsContext, FromJs, Runtime as JsRuntime};
use serde_json::Value;

use crate::{ProcflowError, Result, common::MemCache, common::Vars};

const JS_MEMORY_LIMIT: usize = 16 * 1024 * 1024;

/// Default wall-clock budget for one evaluation.
pub const DEFAULT_EVAL_TIMEOUT: Duration = Duration::from_millis(1000);

/// Runs before any user code. String-built property names can still walk to
/// `constructor`, so every path to `Function`, `eval` and the generator or
/// async function constructors is removed and locked.
const SANDBOX_PRELUDE: &str = r#"(function (global) {
    var locked = { value: undefined, writable: false, enumerable: false, configurable: false };
    [
        Function.prototype,
        Object.getPrototypeOf(function* () {}),
        Object.getPrototypeOf(async function () {}),
        Object.getPrototypeOf(async function* () {}),
        Object.prototype,
        Array.prototype,
        String.prototype,
        Number.prototype,
        Boolean.prototype
    ].forEach(function (proto) {
        Object.defineProperty(proto, "constructor", locked);
    });
    delete global.eval;
    delete global.Function;
})(this);
"#;

/// Terms no expression may mention.
pub const DEFAULT_DENYLIST: &[&str] = &[
    "eval",
    "Function",
    "function",
    "constructor",
    "__proto__",
    "prototype",
    "Reflect",
    "Proxy",
    "globalThis",
    "import",
    "require",
    "process",
    "std",
    "os",
    "fetch",
    "WebAssembly",
    "while",
    "for",
    "do",
    "class",
    "new",
    "async",
    "await",
    "yield",
    "Symbol",
];

/// Operators rejected wherever they appear.
const DENIED_TOKENS: &[&str] = &["=>", "`"];

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do", "else", "enum", "export", "extends", "false",
    "finally", "for", "function", "if", "import", "in", "instanceof", "let", "new", "null", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "undefined", "var", "void", "while", "with", "yield", "await", "NaN", "Infinity", "JSON", "vars",
];

/// Evaluates expressions against instance variables.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        expression: &str,
        vars: &Vars,
    ) -> Result<Value>;

    fn evaluate_bool(
        &self,
        expression: &str,
        vars: &Vars,
    ) -> Result<bool> {
        Ok(is_truthy(&self.evaluate(expression, vars)?))
    }
}

/// JavaScript truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub struct JsExpressionEvaluator {
    denied: Regex,
    identifier: Regex,
    verdicts: MemCache<String, std::result::Result<(), String>>,
    timeout: Duration,
}

impl JsExpressionEvaluator {
    pub fn new(
        extra_denylist: &[String],
        cache_size: usize,
    ) -> Result<Self> {
        let terms: Vec<String> = DEFAULT_DENYLIST.iter().map(|t| t.to_string()).chain(extra_denylist.iter().cloned()).map(|t| regex::escape(&t)).collect();
        let denied = Regex::new(&format!(r"\b(?:{})\b", terms.join("|"))).map_err(|e| ProcflowError::Expression(e.to_string()))?;
        let identifier = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").map_err(|e| ProcflowError::Expression(e.to_string()))?;

        Ok(Self {
            denied,
            identifier,
            verdicts: MemCache::new(cache_size),
            timeout: DEFAULT_EVAL_TIMEOUT,
        })
    }

    /// Abort any evaluation still running after `timeout`.
    pub fn with_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject expressions that mention a denied term.
    pub fn check(
        &self,
        expression: &str,
    ) -> Result<()> {
        self.verdicts
            .get_or_insert_with(expression.to_string(), || {
                if let Some(token) = DENIED_TOKENS.iter().find(|t| expression.contains(*t)) {
                    return Err(format!("expression uses denied token '{}'", token));
                }
                match self.denied.find(expression) {
                    Some(m) => Err(format!("expression uses denied term '{}'", m.as_str())),
                    None => Ok(()),
                }
            })
            .map_err(ProcflowError::Expression)
    }

    fn bindings(
        &self,
        vars: &Vars,
    ) -> Result<String> {
        let mut script = format!("var vars = {};\n", serde_json::to_string(vars)?);
        for key in vars.keys() {
            if self.identifier.is_match(key) && !RESERVED.contains(&key.as_str()) {
                script.push_str(&format!("var {} = vars[{}];\n", key, serde_json::to_string(key)?));
            }
        }
        Ok(script)
    }

    /// Run an already screened script that yields a one-element JSON array.
    fn run(
        &self,
        expression: &str,
        code: String,
    ) -> Result<Value> {
        let runtime = JsRuntime::new().map_err(|e| ProcflowError::Expression(e.to_string()))?;
        runtime.set_memory_limit(JS_MEMORY_LIMIT);
        let deadline = Instant::now() + self.timeout;
        runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));
        let ctx = JsContext::full(&runtime).map_err(|e| ProcflowError::Expression(e.to_string()))?;
        let code = format!("{}{}", SANDBOX_PRELUDE, code);

        ctx.with(|ctx| {
            let result: std::result::Result<String, _> = ctx.eval(code);
            match result {
                Ok(json_str) => {
                    let mut values: Vec<Value> = serde_json::from_str(&json_str)?;
                    Ok(if values.is_empty() { Value::Null } else { values.swap_remove(0) })
                }
                Err(rquickjs::Error::Exception) if Instant::now() >= deadline => {
                    Err(ProcflowError::Expression(format!("'{}': evaluation exceeded {:?}", expression, self.timeout)))
                }
                Err(rquickjs::Error::Exception) => {
                    let message = rquickjs::Exception::from_js(&ctx, ctx.catch()).ok().and_then(|e| e.message()).unwrap_or_default();
                    Err(ProcflowError::Expression(format!("'{}': {}", expression, message)))
                }
                Err(e) => Err(ProcflowError::Expression(e.to_string())),
            }
        })
    }
}

impl ExpressionEvaluator for JsExpressionEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        vars: &Vars,
    ) -> Result<Value> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(ProcflowError::Expression("empty expression".into()));
        }
        self.check(expression)?;

        let code = format!("{}JSON.stringify([({})]);", self.bindings(vars)?, expression);
        self.run(expression, code)
    }
}
