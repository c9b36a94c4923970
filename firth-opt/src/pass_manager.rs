//! Define the PassManager structure that is used to register and run
//! passes.

use crate::traversal;
use firth_ir::Circuit;
use firth_utils::{Error, FirthResult};
use std::collections::HashMap;
use std::time::Instant;

/// Top-level type for all passes that transform a [`Circuit`].
pub type PassClosure = Box<dyn Fn(&mut Circuit) -> FirthResult<()>>;

/// Structure that tracks all registered passes for the compiler.
#[derive(Default)]
pub struct PassManager {
    /// All registered passes
    passes: HashMap<String, PassClosure>,
    /// Tracks the help information for passes
    help: HashMap<String, String>,
}

impl PassManager {
    /// Register a new pass and return an error if another pass with the
    /// same name has already been registered.
    pub fn register_pass<P>(&mut self) -> FirthResult<()>
    where
        P: traversal::Pass + traversal::Named + Default + 'static,
    {
        let name = P::name().to_string();
        if self.passes.contains_key(&name) {
            return Err(Error::misc(format!(
                "Pass with name '{name}' is already registered."
            )));
        }
        self.passes.insert(
            name.clone(),
            Box::new(|circ| {
                P::do_pass_default(circ)?;
                Ok(())
            }),
        );
        self.help
            .insert(name.clone(), format!("- {}: {}", name, P::description()));
        Ok(())
    }

    /// Return a string representation to show all available passes.
    pub fn show_names(&self) -> String {
        let mut names: Vec<_> = self.help.values().cloned().collect();
        names.sort();
        names.join("\n")
    }

    /// Run the pass with the given name on the circuit.
    pub fn execute_pass(
        &self,
        circ: &mut Circuit,
        name: &str,
    ) -> FirthResult<()> {
        let pass = self.passes.get(name).ok_or_else(|| {
            Error::misc(format!("unknown pass `{name}'"))
        })?;
        let start = Instant::now();
        let res = pass(circ);
        log::info!("pass {name}: {}ms", start.elapsed().as_millis());
        res
    }
}
