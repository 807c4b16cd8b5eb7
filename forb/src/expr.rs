//! Expression extension table
//!
//! Exposes registered constants and functions to an expression evaluator.
//! Unknown names, arity and coercion are handled here so that plugin
//! functions only ever see well-formed calls.

use crate::fault::catch;
use forb_core::{ForbError, Number};
use forb_plugin::{CapabilityKind, CapabilityRegistry, EvalContext, ExprFuncMeta, ExprVarMeta};
use std::sync::Arc;
use tracing::warn;

const MAX_SUGGESTIONS: usize = 5;

pub struct ExprTable {
    registry: Arc<CapabilityRegistry>,
    ctx: EvalContext,
}

impl ExprTable {
    pub fn new(registry: Arc<CapabilityRegistry>, ctx: EvalContext) -> Self {
        Self { registry, ctx }
    }

    pub fn context(&self) -> &EvalContext {
        &self.ctx
    }

    /// Value of a named constant
    pub fn constant(&self, id: &str) -> Result<Number, ForbError> {
        let Some(var) = self.registry.expr_var(id) else {
            return Err(self.suggest(ForbError::undefined_const(id), CapabilityKind::ExprVar, id));
        };
        let meta = var.meta();
        match catch(|| var.plugin().value(&self.ctx)) {
            Ok(result) => result,
            Err(reason) => Err(self.fault(&meta.id, reason)),
        }
    }

    /// Call a function with already-evaluated arguments.
    ///
    /// The argument count must equal the declared arity. Each argument is
    /// coerced by its declared rule before the call.
    pub fn call(&self, id: &str, args: &[Number]) -> Result<Number, ForbError> {
        let Some(func) = self.registry.expr_func(id) else {
            return Err(self.suggest(ForbError::undefined_func(id), CapabilityKind::ExprFunc, id));
        };
        let meta = func.meta();
        if args.len() != meta.arity() {
            return Err(ForbError::arity_mismatch(&meta.id, meta.arity(), args.len())
                .with_suggestion(format!("Usage: {}", meta.usage())));
        }

        let coerced: Vec<Number> = meta.args.iter().zip(args).map(|(arg, n)| arg.coercion.apply(n)).collect();
        match catch(|| func.plugin().call(&coerced, &self.ctx)) {
            Ok(result) => result,
            Err(reason) => Err(self.fault(&meta.id, reason)),
        }
    }

    pub fn constants(&self) -> Vec<&ExprVarMeta> {
        self.registry.expr_vars().iter().map(|v| v.meta()).collect()
    }

    pub fn functions(&self) -> Vec<&ExprFuncMeta> {
        self.registry.expr_funcs().iter().map(|f| f.meta()).collect()
    }

    /// One-line help for a function or constant
    pub fn help(&self, name: &str) -> Option<String> {
        if let Some(func) = self.registry.expr_func(name) {
            let meta = func.meta();
            return Some(format!("{} - {}", meta.usage(), meta.description));
        }
        self.registry
            .expr_var(name)
            .map(|var| format!("{} - {}", var.meta().id, var.meta().description))
    }

    fn suggest(&self, err: ForbError, kind: CapabilityKind, name: &str) -> ForbError {
        let similar = self.registry.find_similar(kind, name);
        if similar.is_empty() {
            return err;
        }
        let shown: Vec<&str> = similar.iter().take(MAX_SUGGESTIONS).map(String::as_str).collect();
        err.with_suggestion(format!("Similar: {}", shown.join(", ")))
    }

    fn fault(&self, id: &str, reason: String) -> ForbError {
        warn!(capability = %id, reason = %reason, "expression plugin fault");
        ForbError::plugin_fault(id, reason)
    }
}
