use crate::Bus;

/// A cycle-stepped CPU.
pub trait Cpu {
    /// Snapshot of the CPU's architectural registers, returned by value
    /// for observers (debuggers, tests) that shouldn't hold a borrow.
    type Registers;

    /// Advance the CPU by exactly one master cycle.
    fn tick<B: Bus>(&mut self, bus: &mut B);

    /// Current program counter.
    fn pc(&self) -> u32;

    /// Copy of the architectural register file.
    fn registers(&self) -> Self::Registers;

    /// True once the CPU has executed a JAM opcode. `tick` becomes a
    /// no-op until `reset`.
    fn is_halted(&self) -> bool;

    /// Set the external IRQ line's level. Level-sensed: the interrupt is
    /// taken as long as the line is high and the I flag is clear, and is
    /// re-taken after RTI if the line is still high and nothing cleared
    /// it.
    fn set_irq_line(&mut self, asserted: bool);

    /// Set the external NMI line's level. Edge-sensed: only the
    /// high-to-low (asserted) transition latches a pending NMI.
    fn set_nmi_line(&mut self, asserted: bool);

    /// Set the RDY input. While low, the CPU stalls on its next read
    /// cycle (write cycles are never stalled — matches real 6510 wiring).
    fn set_rdy_line(&mut self, ready: bool);

    /// Hardware reset: reload PC from the reset vector, clear `jammed`,
    /// set I, leave other registers as real hardware does (undefined but
    /// stable across two consecutive resets — see the idempotence
    /// property).
    fn reset<B: Bus>(&mut self, bus: &mut B);
}
