//! Interrupt pin capability
//!
//! The handler registered with [`InterruptPin::register_callback`] runs in
//! interrupt context. It must not block, touch the bus, or log.

use crate::error::Result;

/// Edge that triggers the pin interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

/// Handler invoked on each configured edge
pub type EdgeHandler = Box<dyn Fn() + Send + Sync + 'static>;

/// GPIO capability for the sensor's interrupt line
pub trait InterruptPin {
    /// Whether the GPIO port is ready
    fn is_ready(&self) -> bool;

    /// Configure the pin as an input
    fn configure_input(&mut self) -> Result<()>;

    /// Enable the pin interrupt on `edge`
    fn configure_interrupt(&mut self, edge: Edge) -> Result<()>;

    /// Install the edge handler, replacing any previous one
    fn register_callback(&mut self, handler: EdgeHandler) -> Result<()>;
}

impl<G: InterruptPin + ?Sized> InterruptPin for Box<G> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn configure_input(&mut self) -> Result<()> {
        (**self).configure_input()
    }

    fn configure_interrupt(&mut self, edge: Edge) -> Result<()> {
        (**self).configure_interrupt(edge)
    }

    fn register_callback(&mut self, handler: EdgeHandler) -> Result<()> {
        (**self).register_callback(handler)
    }
}
