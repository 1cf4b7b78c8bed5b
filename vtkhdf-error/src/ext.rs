use crate::{ErrString, VtkHdfResult};

/// Extension trait for VtkHdfResult
pub trait ResultExt<T>: private::Sealed {
    /// Wrap the error, if any, in a [`VtkHdfError::Context`](crate::VtkHdfError::Context) layer.
    ///
    /// The message is only built on the error path.
    fn with_context<M, F>(self, msg: F) -> VtkHdfResult<T>
    where
        M: Into<ErrString>,
        F: FnOnce() -> M;
}

mod private {
    use crate::VtkHdfResult;

    pub trait Sealed {}

    impl<T> Sealed for VtkHdfResult<T> {}
}

impl<T> ResultExt<T> for VtkHdfResult<T> {
    fn with_context<M, F>(self, msg: F) -> VtkHdfResult<T>
    where
        M: Into<ErrString>,
        F: FnOnce() -> M,
    {
        self.map_err(|e| e.with_context(msg()))
    }
}
