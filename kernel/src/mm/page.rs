//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 地址与页帧类型

pub use crate::config::PAGE_SIZE;

pub const PAGE_MASK: usize = PAGE_SIZE - 1;

pub type PhysFrameNr = usize;

pub type VirtPageNr = usize;

/// 向下对齐到页边界
#[inline]
pub const fn page_round_down(addr: usize) -> usize {
    addr & !PAGE_MASK
}

/// 向上对齐到页边界
#[inline]
pub const fn page_round_up(addr: usize) -> usize {
    (addr + PAGE_MASK) & !PAGE_MASK
}

/// 向上对齐到页边界，溢出时返回 `None`（用户传入的长度必须走这里）
#[inline]
pub const fn checked_page_round_up(addr: usize) -> Option<usize> {
    match addr.checked_add(PAGE_MASK) {
        Some(v) => Some(v & !PAGE_MASK),
        None => None,
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(pub usize);

/// 用户虚拟地址
///
/// 与页帧号不同，虚拟地址不强制对齐：缺页地址可以落在页中间
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtAddr(pub usize);

impl PhysAddr {
    pub fn as_usize(&self) -> usize {
        self.0
    }

    pub fn frame_number(&self) -> PhysFrameNr {
        self.0 / PAGE_SIZE
    }
}

impl VirtAddr {
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn as_usize(&self) -> usize {
        self.0
    }

    #[inline]
    pub fn is_aligned(&self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    #[inline]
    pub fn floor(&self) -> Self {
        Self(page_round_down(self.0))
    }

    #[inline]
    pub fn ceil(&self) -> Self {
        Self(page_round_up(self.0))
    }

    /// 页内偏移
    #[inline]
    pub fn page_offset(&self) -> usize {
        self.0 & PAGE_MASK
    }

    #[inline]
    pub fn page_number(&self) -> VirtPageNr {
        self.0 / PAGE_SIZE
    }

    #[inline]
    pub fn plus(&self, bytes: usize) -> Self {
        Self(self.0 + bytes)
    }
}

impl core::fmt::LowerHex for VirtAddr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::LowerHex::fmt(&self.0, f)
    }
}

/// 物理页帧
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysFrame {
    pub number: PhysFrameNr,
}

impl PhysFrame {
    pub const fn new(number: PhysFrameNr) -> Self {
        Self { number }
    }

    pub fn containing_address(addr: PhysAddr) -> Self {
        Self::new(addr.frame_number())
    }

    pub fn start_address(&self) -> PhysAddr {
        PhysAddr(self.number * PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding() {
        assert_eq!(page_round_down(0), 0);
        assert_eq!(page_round_down(PAGE_SIZE + 1), PAGE_SIZE);
        assert_eq!(page_round_up(PAGE_SIZE + 1), 2 * PAGE_SIZE);
        assert_eq!(page_round_up(2 * PAGE_SIZE), 2 * PAGE_SIZE);
    }

    #[test]
    fn test_checked_round_up_overflow() {
        assert_eq!(checked_page_round_up(PAGE_SIZE + 1), Some(2 * PAGE_SIZE));
        assert_eq!(checked_page_round_up(usize::MAX - PAGE_MASK), Some(usize::MAX - PAGE_MASK));
        assert_eq!(checked_page_round_up(usize::MAX), None);
        assert_eq!(checked_page_round_up(usize::MAX - PAGE_MASK + 1), None);
    }

    #[test]
    fn test_virt_addr_keeps_offset() {
        let va = VirtAddr::new(3 * PAGE_SIZE + 17);
        assert!(!va.is_aligned());
        assert_eq!(va.page_offset(), 17);
        assert_eq!(va.floor(), VirtAddr::new(3 * PAGE_SIZE));
        assert_eq!(va.ceil(), VirtAddr::new(4 * PAGE_SIZE));
        assert_eq!(va.page_number(), 3);
    }

    #[test]
    fn test_frame_address() {
        let frame = PhysFrame::new(5);
        assert_eq!(frame.start_address(), PhysAddr(5 * PAGE_SIZE));
        assert_eq!(PhysFrame::containing_address(PhysAddr(5 * PAGE_SIZE + 8)), frame);
    }
}
