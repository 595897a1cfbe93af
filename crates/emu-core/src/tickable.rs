use crate::Ticks;

/// Something that advances by one master cycle at a time.
pub trait Tickable {
    /// Advance by exactly one master cycle.
    fn tick(&mut self);

    /// Advance by `count` master cycles. The default just loops; override
    /// when a component can skip idle cycles in bulk (see the CIA's
    /// idle-skip wake-up cycle).
    fn tick_n(&mut self, count: Ticks) {
        for _ in 0..count.get() {
            self.tick();
        }
    }
}
