use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use types::Irq;

use crate::interrupt::Param;
use crate::kernel::Kernel;

pub type InterruptHandler = Arc<dyn Fn(&mut Kernel, Vec<Param>) + Send + Sync>;

/// Interrupt vector table: IRQ number to service routine.
#[derive(Default)]
pub struct InterruptVector {
    handlers: HashMap<Irq, InterruptHandler>,
}

impl fmt::Debug for InterruptVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptVector")
            .field("registered", &self.handlers.len())
            .finish()
    }
}

impl InterruptVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, irq: Irq, handler: InterruptHandler) {
        self.handlers.insert(irq, handler);
    }

    /// Handler for `irq`, cloned out so the caller can hand the kernel to it.
    pub fn handler(&self, irq: Irq) -> Option<InterruptHandler> {
        self.handlers.get(&irq).cloned()
    }

    pub fn is_registered(&self, irq: Irq) -> bool {
        self.handlers.contains_key(&irq)
    }
}
