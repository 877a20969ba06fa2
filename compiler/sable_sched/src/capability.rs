//! Worker capability masks.

use bitflags::bitflags;

use sable_core::ReasonForBeing;

bitflags! {
    /// Which phase queues a worker may pull from, one bit per queue.
    ///
    /// Bit positions follow [`ReasonForBeing::queue_index`]; the two IR
    /// reasons share the `GENERATE_IR` bit like they share a queue.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct PhaseMask: u16 {
        const LOAD = 1 << 0;
        const LEX = 1 << 1;
        const PARSE = 1 << 2;
        const TYPE_CHECK = 1 << 3;
        const GENERATE_IR = 1 << 4;
        const EXECUTE = 1 << 5;
        const MACHINE_CODE = 1 << 6;
        const LINK = 1 << 7;
        const MESSAGE = 1 << 8;
        const CONVERT_NODE = 1 << 9;
        const TYPE_INIT = 1 << 10;
        const TYPE_SIZE = 1 << 11;
    }
}

impl PhaseMask {
    /// Mask with only the bit for one queue index.
    #[inline]
    pub fn for_queue(index: usize) -> Self {
        debug_assert!(index < sable_core::QUEUE_COUNT);
        PhaseMask::from_bits_truncate(1 << index)
    }

    /// Mask with only the bit for a reason's queue.
    #[inline]
    pub fn for_reason(reason: ReasonForBeing) -> Self {
        Self::for_queue(reason.queue_index())
    }

    /// Whether this mask allows pulling from a queue.
    #[inline]
    pub fn allows_queue(self, index: usize) -> bool {
        self.contains(Self::for_queue(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_queue_has_a_bit() {
        for index in 0..sable_core::QUEUE_COUNT {
            assert!(PhaseMask::all().allows_queue(index));
            assert!(PhaseMask::for_queue(index).allows_queue(index));
        }
    }

    #[test]
    fn ir_reasons_share_a_bit() {
        assert_eq!(
            PhaseMask::for_reason(ReasonForBeing::GenerateIr),
            PhaseMask::for_reason(ReasonForBeing::GenerateIrForMetaprogram)
        );
        assert_eq!(
            PhaseMask::for_reason(ReasonForBeing::GenerateIr),
            PhaseMask::GENERATE_IR
        );
    }

    #[test]
    fn masks_compose() {
        let mask = PhaseMask::LEX | PhaseMask::TYPE_CHECK;
        assert!(mask.allows_queue(ReasonForBeing::LexFile.queue_index()));
        assert!(mask.allows_queue(ReasonForBeing::TypeCheck.queue_index()));
        assert!(!mask.allows_queue(ReasonForBeing::LinkProgram.queue_index()));
    }
}
