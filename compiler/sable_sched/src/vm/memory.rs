//! Flat VM memory with allocation and leak tracking.
//!
//! Addresses are stable `u64` offsets into one growing byte arena, never
//! raw host pointers. Address 0 is reserved as null. The allocation table
//! doubles as the leak tracker: the decoder asks it whether a string or
//! slice backing buffer was heap-allocated by the VM's own allocator and
//! releases it after copying the contents out.

use rustc_hash::FxHashMap;

/// An offset into VM memory.
pub type VmAddr = u64;

struct Allocation {
    len: usize,
    live: bool,
}

/// One VM's addressable byte space.
pub struct VmMemory {
    bytes: Vec<u8>,
    heap: FxHashMap<VmAddr, Allocation>,
}

impl VmMemory {
    /// Create memory with the null address reserved.
    pub fn new() -> Self {
        VmMemory {
            // First 8 bytes reserved so no allocation lands at 0.
            bytes: vec![0; 8],
            heap: FxHashMap::default(),
        }
    }

    fn bump(&mut self, len: usize) -> VmAddr {
        let addr = (self.bytes.len() as u64 + 7) & !7;
        let addr_usize = usize::try_from(addr).unwrap_or_else(|_| {
            unreachable!("VM memory exceeds the host address space")
        });
        self.bytes.resize(addr_usize + len, 0);
        addr
    }

    /// Reserve zeroed, untracked memory (stack/result slots).
    pub fn stack_alloc(&mut self, len: usize) -> VmAddr {
        self.bump(len)
    }

    /// Allocate zeroed memory through the VM's own allocator; tracked for
    /// leak checking and releasable via [`free`](Self::free).
    pub fn heap_alloc(&mut self, len: usize) -> VmAddr {
        let addr = self.bump(len);
        self.heap.insert(addr, Allocation { len, live: true });
        addr
    }

    /// Whether `addr` is a live heap allocation (leak-tracker query).
    pub fn is_heap_allocation(&self, addr: VmAddr) -> bool {
        self.heap.get(&addr).is_some_and(|a| a.live)
    }

    /// Release a heap allocation.
    ///
    /// # Panics
    /// Double frees and frees of untracked addresses are VM bugs.
    pub fn free(&mut self, addr: VmAddr) {
        let allocation = self.heap.get_mut(&addr);
        let Some(allocation) = allocation else {
            unreachable!("free of untracked VM address {addr:#x}");
        };
        assert!(allocation.live, "double free of VM address {addr:#x}");
        allocation.live = false;
    }

    /// Number of live heap allocations (leak check at VM teardown).
    pub fn live_allocations(&self) -> usize {
        self.heap.values().filter(|a| a.live).count()
    }

    /// Bytes still held by live heap allocations.
    pub fn live_bytes(&self) -> usize {
        self.heap.values().filter(|a| a.live).map(|a| a.len).sum()
    }

    /// Read `len` bytes at `addr`.
    ///
    /// # Panics
    /// An out-of-range read is an internal invariant violation.
    pub fn read_bytes(&self, addr: VmAddr, len: usize) -> &[u8] {
        let start = usize::try_from(addr)
            .unwrap_or_else(|_| unreachable!("VM address {addr:#x} out of range"));
        assert!(
            start != 0 || len == 0,
            "read through the null VM address"
        );
        assert!(
            start + len <= self.bytes.len(),
            "VM read of {len} bytes at {addr:#x} past end of memory"
        );
        &self.bytes[start..start + len]
    }

    /// Write `bytes` at `addr`.
    pub fn write_bytes(&mut self, addr: VmAddr, bytes: &[u8]) {
        let start = usize::try_from(addr)
            .unwrap_or_else(|_| unreachable!("VM address {addr:#x} out of range"));
        assert!(start != 0 || bytes.is_empty(), "write through the null VM address");
        assert!(
            start + bytes.len() <= self.bytes.len(),
            "VM write past end of memory"
        );
        self.bytes[start..start + bytes.len()].copy_from_slice(bytes);
    }

    // === Typed accessors (little-endian, like the VM's stack) ===

    pub fn read_u8(&self, addr: VmAddr) -> u8 {
        self.read_bytes(addr, 1)[0]
    }

    pub fn read_u16(&self, addr: VmAddr) -> u16 {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.read_bytes(addr, 2));
        u16::from_le_bytes(buf)
    }

    pub fn read_u32(&self, addr: VmAddr) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.read_bytes(addr, 4));
        u32::from_le_bytes(buf)
    }

    pub fn read_u64(&self, addr: VmAddr) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(addr, 8));
        u64::from_le_bytes(buf)
    }

    pub fn read_f32(&self, addr: VmAddr) -> f32 {
        f32::from_bits(self.read_u32(addr))
    }

    pub fn read_f64(&self, addr: VmAddr) -> f64 {
        f64::from_bits(self.read_u64(addr))
    }

    pub fn write_u8(&mut self, addr: VmAddr, value: u8) {
        self.write_bytes(addr, &[value]);
    }

    pub fn write_u16(&mut self, addr: VmAddr, value: u16) {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    pub fn write_u32(&mut self, addr: VmAddr, value: u32) {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    pub fn write_u64(&mut self, addr: VmAddr, value: u64) {
        self.write_bytes(addr, &value.to_le_bytes());
    }

    pub fn write_f32(&mut self, addr: VmAddr, value: f32) {
        self.write_u32(addr, value.to_bits());
    }

    pub fn write_f64(&mut self, addr: VmAddr, value: f64) {
        self.write_u64(addr, value.to_bits());
    }
}

impl Default for VmMemory {
    fn default() -> Self {
        Self::new()
    }
}
