pub mod diagnostics;
pub mod keyval;
pub mod queue;

#[cfg(test)]
pub(crate) mod testing;
