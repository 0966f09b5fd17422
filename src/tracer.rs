//! Exposes testing, profiling and tracing capabilities.

use crate::render::graph::ObserverId;

macro_rules! define_tracer {
    ($(
        $(#[$meta:meta])*
        fn $name:ident(&self $(, $arg:ident: $ty:ty)* $(,)?);
    )*) => {
        /// A handler that receives render graph and view maintenance events.
        ///
        /// Every method has an empty default implementation,
        /// so implementors only override the events they are interested in.
        pub trait Tracer: Sync {
            $(
                $(#[$meta])*
                fn $name(&self $(, $arg: $ty)*) {
                    $(let _ = $arg;)*
                }
            )*
        }

        impl Tracer for Noop {}

        impl Tracer for Log {
            $(
                fn $name(&self $(, $arg: $ty)*) {
                    log::log!(self.0, "{}{:?}", stringify!($name), ($(&$arg,)*));
                }
            )*
        }

        impl<T: TracerTuple> Tracer for Aggregate<T> {
            $(
                fn $name(&self $(, $arg: $ty)*) {
                    self.0.each(&mut |tracer: &dyn Tracer| tracer.$name($($arg),*));
                }
            )*
        }

        impl<T: Tracer + ?Sized> Tracer for &T {
            $(
                fn $name(&self $(, $arg: $ty)*) { (**self).$name($($arg),*) }
            )*
        }
    };
}

define_tracer! {
    /// A render graph starts rebuilding its timeline.
    fn start_build(&self);

    /// A render graph has finished building a timeline of `stages` stages.
    fn end_build(&self, stages: usize);

    /// A frame starts executing for an observer.
    fn start_frame(&self, observer: ObserverId);

    /// A frame has finished executing for an observer.
    fn end_frame(&self, observer: ObserverId);

    /// The tasks of a stage start executing.
    fn start_stage(&self, stage: usize);

    /// A task starts executing.
    fn start_task(&self, stage: usize, task: &str);

    /// A task has finished executing.
    fn end_task(&self, stage: usize, task: &str);

    /// A view applied its queued membership changes.
    fn drain_view(&self, added: usize, removed: usize);
}

/// An empty tracer.
pub struct Noop;

/// Groups multiple tracers into a tuple and dispatches each call to them in serial.
pub struct Aggregate<T>(
    /// A tuple of child tracers to execute in serial.
    pub T,
);

/// A tracer that logs all events.
pub struct Log(
    /// The log level to log events with.
    pub log::Level,
);

/// A tuple of tracers usable in [`Aggregate`].
pub trait TracerTuple: Sync {
    /// Calls `f` on each tracer in order.
    fn each(&self, f: &mut dyn FnMut(&dyn Tracer));
}

macro_rules! impl_tracer_tuple {
    ($($ty:ident $index:tt),*) => {
        impl<$($ty: Tracer),*> TracerTuple for ($($ty,)*) {
            fn each(&self, f: &mut dyn FnMut(&dyn Tracer)) {
                $(f(&self.$index);)*
            }
        }
    };
}

impl_tracer_tuple!(A 0, B 1);
impl_tracer_tuple!(A 0, B 1, C 2);
impl_tracer_tuple!(A 0, B 1, C 2, D 3);
