//! Start-block gate.
//!
//! Suppresses forwarding while the node replays history below a configured
//! height. The gate opens on the first accepted block at or above
//! `start_block_num` and never closes again.

/// One-way start-block gate, owned by the consumer thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartBlockGate {
    start_block_num: u32,
    reached: bool,
}

impl StartBlockGate {
    /// A gate at height `0` starts open.
    pub fn new(start_block_num: u32) -> Self {
        Self {
            start_block_num,
            reached: start_block_num == 0,
        }
    }

    pub fn start_block_num(&self) -> u32 {
        self.start_block_num
    }

    pub fn is_reached(&self) -> bool {
        self.reached
    }

    /// Feed an accepted block height.
    ///
    /// Returns `true` only for the call that opened the gate.
    pub fn observe(&mut self, block_num: u32) -> bool {
        if !self.reached && block_num >= self.start_block_num {
            self.reached = true;
            return true;
        }
        false
    }
}
