/// Access to the id of the processor the caller runs on.
pub trait Cpus {
    /// Run `f` with the current processor id, with migration to another
    /// processor disabled until `f` returns (interrupts off on hardware).
    fn with_current<R>(&self, f: impl FnOnce(usize) -> R) -> R;
}

impl<C: Cpus> Cpus for &C {
    fn with_current<R>(&self, f: impl FnOnce(usize) -> R) -> R {
        (**self).with_current(f)
    }
}

/// The boot processor before the others are started: always id 0.
#[derive(Debug, Default, Copy, Clone)]
pub struct BootCpu;

impl Cpus for BootCpu {
    #[inline]
    fn with_current<R>(&self, f: impl FnOnce(usize) -> R) -> R {
        f(0)
    }
}
