//! Clock port - timestamps for readings

/// Port for reading the current time
pub trait Clock {
    /// Current unix time in seconds
    fn now(&self) -> i64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> i64 {
        (**self).now()
    }
}
