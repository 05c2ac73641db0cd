use std::collections::HashSet;

use tracing::{debug, info};

use super::handler::{BoxedHandler, IterateHandler, MultiIterateCallback};
use crate::engine::errors::{ExecResult, ExecutionError};
use crate::engine::metrics::QualifiedPush;
use crate::engine::session::Session;

/// Runs one iteration pass over `field` that serves every handler, and
/// returns their outputs in the order given.
///
/// Scopes are validated before any remote call. Pushed stats are popped
/// again whether the pass succeeds or not.
pub fn execute_multi<'a, T>(
    session: &mut Session,
    field: &str,
    mut handlers: Vec<BoxedHandler<'a, T>>,
) -> ExecResult<Vec<T>> {
    let Some(first) = handlers.first() else {
        return Err(ExecutionError::NoIterateHandlers);
    };
    let scope = first.scope().clone();
    if let Some(other) = handlers.iter().find(|h| h.scope() != &scope) {
        return Err(ExecutionError::ScopeMismatch {
            expected: scope,
            found: other.scope().clone(),
        });
    }

    let mut pushes: HashSet<QualifiedPush> = HashSet::new();
    for handler in &handlers {
        pushes.extend(handler.requires());
    }

    let result = (|| -> ExecResult<Vec<T>> {
        let pushed = session.push_metrics(&pushes)?;
        for handler in handlers.iter_mut() {
            handler.register(&pushed.indexes, &session.group_key_set);
        }

        let kind = session.field_kind(field)?;
        debug!(
            target: "group_ql::iterate",
            field,
            ?kind,
            handlers = handlers.len(),
            stats = pushed.num_stats(),
            "Running iterate handlers"
        );
        let mut callback = MultiIterateCallback::new(&mut handlers);
        session.iterate(field, kind, &scope, &pushed, &mut callback)?;

        let mut outputs = Vec::with_capacity(handlers.len());
        for handler in handlers.iter_mut() {
            outputs.push(handler.finish(&mut *session)?);
        }
        Ok(outputs)
    })();

    let popped = session.pop_stats();
    let outputs = result.inspect_err(|e| e.log_error())?;
    popped?;
    info!(target: "group_ql::iterate", field, handlers = outputs.len(), "Iteration finished");
    Ok(outputs)
}

pub fn execute_single<'a, H>(session: &mut Session, field: &str, handler: H) -> ExecResult<H::Output>
where
    H: IterateHandler + 'a,
{
    let boxed: BoxedHandler<'a, H::Output> = Box::new(handler);
    let mut outputs = execute_multi(session, field, vec![boxed])?;
    outputs.pop().ok_or(ExecutionError::NoIterateHandlers)
}
