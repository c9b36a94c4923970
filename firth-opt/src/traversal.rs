//! Infrastructure for defining passes over a [`Circuit`].

use firth_ir::Circuit;
use firth_utils::FirthResult;

/// Trait that describes named things. Required by
/// [`do_pass_default`](Pass::do_pass_default) and by pass registration.
///
/// This is a separate trait from [`Pass`] because these methods don't
/// receive `self`, which makes trait objects impossible otherwise.
pub trait Named {
    /// The name of a pass. Is used for identifying passes.
    fn name() -> &'static str;
    /// A short description of the pass.
    fn description() -> &'static str;
}

/// A transformation or analysis over an entire circuit.
///
/// A pass may keep arbitrary state in `self` while running, but must leave
/// itself cleared when [`run`](Pass::run) returns: the same pass object can
/// be invoked on several circuits in sequence.
pub trait Pass {
    /// Run the pass on the given circuit. An `Err` marks the circuit as
    /// failed; later passes must not run on it.
    fn run(&mut self, circ: &mut Circuit) -> FirthResult<()>;

    /// Build a [Default] implementation of this pass and run it.
    fn do_pass_default(circ: &mut Circuit) -> FirthResult<Self>
    where
        Self: Default + Named + Sized,
    {
        let mut pass = Self::default();
        log::info!("Running pass `{}'", Self::name());
        pass.run(circ)?;
        Ok(pass)
    }
}
