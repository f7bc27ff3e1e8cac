//! In-flight operation guard

use crate::error::SessionError;

/// Claims a boolean flag for the duration of one operation.
///
/// The flag is cleared in `Drop`, so it is released on every exit path,
/// including a caller abandoning the future at an await point.
pub(crate) struct InFlightGuard<'a> {
    flag: &'a mut bool,
}

impl<'a> InFlightGuard<'a> {
    /// Claim the flag, rejecting with `Busy` when already claimed.
    pub(crate) fn acquire(
        flag: &'a mut bool,
        operation: &'static str,
    ) -> Result<Self, SessionError> {
        if *flag {
            return Err(SessionError::Busy(operation));
        }
        *flag = true;
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        *self.flag = false;
    }
}
