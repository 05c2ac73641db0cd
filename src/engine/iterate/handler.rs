use std::collections::BTreeSet;

use crate::engine::errors::ExecResult;
use crate::engine::metrics::Pushable;
use crate::engine::session::{IterateCallback, Session};
use crate::engine::types::Term;

/// One logical consumer of a field iteration pass.
///
/// Handlers declare their stat needs through [`Pushable`], receive every
/// `(term, stats, group)` row of the pass through [`IterateHandler::term`]
/// and produce their result in [`IterateHandler::finish`]. `register` marks
/// the start of a pass, so handlers reset their per-pass state there.
pub trait IterateHandler: Pushable {
    type Output;

    /// Dataset sessions this handler reads. Handlers batched together must
    /// agree on it.
    fn scope(&self) -> &BTreeSet<String>;

    fn term(&mut self, term: Term<'_>, stats: &[i64], group: usize) -> ExecResult<()>;

    fn need_sorted(&self) -> bool;

    fn need_group(&self) -> bool;

    fn need_stats(&self) -> bool;

    /// Called once after the pass. May issue further remote calls.
    fn finish(&mut self, session: &mut Session) -> ExecResult<Self::Output>;
}

pub type BoxedHandler<'a, T> = Box<dyn IterateHandler<Output = T> + 'a>;

/// Fans every row out to each handler, in registration order.
pub struct MultiIterateCallback<'h, 'a, T> {
    handlers: &'h mut [BoxedHandler<'a, T>],
    need_sorted: bool,
    need_group: bool,
    need_stats: bool,
}

impl<'h, 'a, T> MultiIterateCallback<'h, 'a, T> {
    pub fn new(handlers: &'h mut [BoxedHandler<'a, T>]) -> Self {
        let need_sorted = handlers.iter().any(|h| h.need_sorted());
        let need_group = handlers.iter().any(|h| h.need_group());
        let need_stats = handlers.iter().any(|h| h.need_stats());
        Self {
            handlers,
            need_sorted,
            need_group,
            need_stats,
        }
    }
}

impl<T> IterateCallback for MultiIterateCallback<'_, '_, T> {
    fn term(&mut self, term: Term<'_>, stats: &[i64], group: usize) -> ExecResult<()> {
        for handler in self.handlers.iter_mut() {
            handler.term(term, stats, group)?;
        }
        Ok(())
    }

    fn need_sorted(&self) -> bool {
        self.need_sorted
    }

    fn need_group(&self) -> bool {
        self.need_group
    }

    fn need_stats(&self) -> bool {
        self.need_stats
    }
}
