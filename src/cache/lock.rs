use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Lock access that survives a panic in another holder.
///
/// A poisoned lock is logged and its state used as-is.
pub(crate) trait RecoverLock<T> {
    fn read_or_recover(&self, target: &'static str, op: &'static str) -> RwLockReadGuard<'_, T>;

    fn write_or_recover(&self, target: &'static str, op: &'static str)
    -> RwLockWriteGuard<'_, T>;
}

impl<T> RecoverLock<T> for RwLock<T> {
    fn read_or_recover(&self, target: &'static str, op: &'static str) -> RwLockReadGuard<'_, T> {
        self.read()
            .unwrap_or_else(|poisoned| recovered(poisoned, target, op, "read"))
    }

    fn write_or_recover(
        &self,
        target: &'static str,
        op: &'static str,
    ) -> RwLockWriteGuard<'_, T> {
        self.write()
            .unwrap_or_else(|poisoned| recovered(poisoned, target, op, "write"))
    }
}

fn recovered<G>(
    poisoned: PoisonError<G>,
    target: &'static str,
    op: &'static str,
    mode: &'static str,
) -> G {
    warn!(
        op,
        target_module = target,
        mode,
        "Lock was poisoned by a panicking holder; continuing with current state"
    );
    poisoned.into_inner()
}
