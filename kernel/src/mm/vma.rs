//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 虚拟内存区域 (Virtual Memory Area) - 文件映射描述符
//!
//! 每个 [`Vma`] 描述进程地址空间中一段由文件支撑的连续区域：
//! - 起始地址与长度（起始地址页对齐）
//! - 访问权限，复制到为该区域创建的每个页表项
//! - 共享 / 私有映射：共享映射的修改在 munmap 时写回文件
//! - 文件引用：描述符存活期间持有一个引用
//!
//! 描述符存放在全局的 [`VmaTable`](super::vma_table::VmaTable) 槽位中，
//! 进程通过 [`VmaList`] 持有句柄。

use bitflags::bitflags;

use super::page::{page_round_up, VirtAddr, PAGE_SIZE};
use super::pagemap::{MapError, PteFlags};
use super::vma_table::VmaHandle;
use crate::config::NOVMA;
use crate::fs::{file_dup, FileHandle};

bitflags! {
    /// 映射保护位 (PROT_*)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VmaProt: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
        const EXEC = 0x4;
    }
}

/// 映射类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    /// 修改写回文件 (MAP_SHARED)
    Shared,
    /// 修改在 munmap 时丢弃 (MAP_PRIVATE)
    Private,
}

/// munmap 对描述符的影响
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmapKind {
    /// 整个区域被移除，描述符回收
    Whole,
    /// 移除区域开头，起始地址后移
    Head,
    /// 移除区域结尾，长度缩短
    Tail,
}

/// 文件映射子系统的错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmaError {
    /// 描述符表已满
    PoolExhausted,
    /// 进程的映射表已满
    TooManyMappings,
    /// 地址不在任何映射内
    NoMapping,
    /// 物理页耗尽
    OutOfMemory,
    /// 无法分配页表页
    MapInstallFailed,
    /// munmap 会在映射中间留下空洞
    UnsupportedSplit,
    /// 写回时文件写入不足
    PartialWrite,
    /// 参数无效
    InvalidArgument,
    /// 访问权限不足
    PermissionDenied,
    /// 句柄指向的槽位已被释放或复用
    StaleHandle,
    /// 访问了未驻留的用户地址
    BadAddress,
}

impl core::fmt::Display for VmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            VmaError::PoolExhausted => "no free mapping descriptor",
            VmaError::TooManyMappings => "process mapping table full",
            VmaError::NoMapping => "address not covered by any mapping",
            VmaError::OutOfMemory => "out of physical pages",
            VmaError::MapInstallFailed => "page-table page allocation failed",
            VmaError::UnsupportedSplit => "unmap would split a mapping in two",
            VmaError::PartialWrite => "write-back wrote fewer bytes than requested",
            VmaError::InvalidArgument => "invalid argument",
            VmaError::PermissionDenied => "permission denied",
            VmaError::StaleHandle => "stale mapping handle",
            VmaError::BadAddress => "user address not resident",
        };
        f.write_str(msg)
    }
}

impl From<MapError> for VmaError {
    fn from(err: MapError) -> Self {
        match err {
            MapError::AlreadyMapped | MapError::OutOfMemory => VmaError::MapInstallFailed,
            MapError::NotMapped => VmaError::BadAddress,
            MapError::Invalid => VmaError::InvalidArgument,
        }
    }
}

/// 文件映射描述符
pub struct Vma {
    /// 起始虚拟地址（包含）
    start: VirtAddr,

    /// 长度（字节）
    len: usize,

    /// 访问权限
    prot: VmaProt,

    /// 共享 / 私有
    kind: MapKind,

    /// `start` 对应的文件偏移
    offset: u64,

    /// 被映射的文件
    file: FileHandle,
}

impl Vma {
    /// 创建描述符，`file` 的引用归描述符所有
    pub fn new(
        start: VirtAddr,
        len: usize,
        prot: VmaProt,
        kind: MapKind,
        file: FileHandle,
        offset: u64,
    ) -> Self {
        debug_assert!(start.is_aligned(), "VMA start not page aligned");
        debug_assert!(len > 0, "empty VMA");

        Self {
            start,
            len,
            prot,
            kind,
            offset,
            file,
        }
    }

    /// 复制描述符，新描述符持有独立的文件引用
    pub fn dup(&self) -> Self {
        Self {
            start: self.start,
            len: self.len,
            prot: self.prot,
            kind: self.kind,
            offset: self.offset,
            file: file_dup(&self.file),
        }
    }

    #[inline]
    pub fn start(&self) -> VirtAddr {
        self.start
    }

    /// 结束地址（不包含）
    #[inline]
    pub fn end(&self) -> VirtAddr {
        self.start.plus(self.len)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 覆盖的页数（最后一页可能只用了一部分）
    #[inline]
    pub fn page_count(&self) -> usize {
        page_round_up(self.len) / PAGE_SIZE
    }

    #[inline]
    pub fn prot(&self) -> VmaProt {
        self.prot
    }

    #[inline]
    pub fn kind(&self) -> MapKind {
        self.kind
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.kind == MapKind::Shared
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    /// 取出文件引用，描述符被消费
    pub fn into_file(self) -> FileHandle {
        self.file
    }

    /// 检查地址是否在区域内
    #[inline]
    pub fn contains(&self, addr: VirtAddr) -> bool {
        addr >= self.start && addr < self.end()
    }

    /// 检查是否与 `[start, end)` 按页重叠
    pub fn overlaps(&self, start: VirtAddr, end: VirtAddr) -> bool {
        self.start.as_usize() < page_round_up(end.as_usize())
            && start.as_usize() < page_round_up(self.end().as_usize())
    }

    /// 区域内地址对应的文件偏移
    #[inline]
    pub fn file_offset(&self, addr: VirtAddr) -> u64 {
        self.offset + (addr.as_usize() - self.start.as_usize()) as u64
    }

    /// 为该区域创建页表项时使用的权限：总是用户可访问
    pub fn pte_flags(&self) -> PteFlags {
        let mut flags = PteFlags::U;
        if self.prot.contains(VmaProt::READ) {
            flags |= PteFlags::R;
        }
        if self.prot.contains(VmaProt::WRITE) {
            flags |= PteFlags::W;
        }
        if self.prot.contains(VmaProt::EXEC) {
            flags |= PteFlags::X;
        }
        flags
    }

    /// 判断移除 `[addr, addr + n)` 的效果
    ///
    /// 只接受页粒度的移除：`addr` 页对齐，`n` 为页大小的倍数或正好到达
    /// 区域末尾。中间挖洞返回 [`VmaError::UnsupportedSplit`]。
    pub fn classify_unmap(&self, addr: VirtAddr, n: usize) -> Result<UnmapKind, VmaError> {
        let end = addr.as_usize().checked_add(n).ok_or(VmaError::InvalidArgument)?;
        if n == 0 || addr < self.start || end > self.end().as_usize() {
            return Err(VmaError::InvalidArgument);
        }
        let to_end = end == self.end().as_usize();
        if !addr.is_aligned() || (n % PAGE_SIZE != 0 && !to_end) {
            return Err(VmaError::InvalidArgument);
        }

        match (addr == self.start, to_end) {
            (true, true) => Ok(UnmapKind::Whole),
            (true, false) => Ok(UnmapKind::Head),
            (false, true) => Ok(UnmapKind::Tail),
            (false, false) => Err(VmaError::UnsupportedSplit),
        }
    }

    /// 按 [`UnmapKind::Head`] / [`UnmapKind::Tail`] 收缩区域
    pub fn shrink(&mut self, kind: UnmapKind, n: usize) {
        match kind {
            UnmapKind::Head => {
                self.start = self.start.plus(n);
                self.len -= n;
                self.offset += n as u64;
            }
            UnmapKind::Tail => self.len -= n,
            UnmapKind::Whole => {}
        }
    }
}

impl core::fmt::Debug for Vma {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Vma")
            .field(
                "range",
                &format_args!("0x{:x}-0x{:x}", self.start.as_usize(), self.end().as_usize()),
            )
            .field("prot", &self.prot)
            .field("kind", &self.kind)
            .field("offset", &self.offset)
            .field("file", &self.file.inode().ino())
            .finish()
    }
}

/// 进程的映射表
///
/// 固定 [`NOVMA`] 个槽位，每个槽位为空或指向本进程独占的描述符
#[derive(Debug, Clone)]
pub struct VmaList {
    slots: [Option<VmaHandle>; NOVMA],
}

impl VmaList {
    pub const fn new() -> Self {
        Self {
            slots: [None; NOVMA],
        }
    }

    /// 放入第一个空槽位，返回槽位下标
    pub fn insert(&mut self, handle: VmaHandle) -> Result<usize, VmaError> {
        let idx = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(VmaError::TooManyMappings)?;
        self.slots[idx] = Some(handle);
        Ok(idx)
    }

    /// 放入指定槽位（fork 时保持与父进程相同的布局）
    pub fn insert_at(&mut self, idx: usize, handle: VmaHandle) -> Result<(), VmaError> {
        match self.slots.get_mut(idx) {
            Some(slot @ None) => {
                *slot = Some(handle);
                Ok(())
            }
            Some(Some(_)) => Err(VmaError::TooManyMappings),
            None => Err(VmaError::InvalidArgument),
        }
    }

    /// 移除句柄，返回它是否存在
    pub fn remove(&mut self, handle: VmaHandle) -> bool {
        match self.slots.iter_mut().find(|slot| **slot == Some(handle)) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, handle: VmaHandle) -> bool {
        self.slots.iter().any(|slot| *slot == Some(handle))
    }

    /// 遍历 (槽位下标, 句柄)
    pub fn iter(&self) -> impl Iterator<Item = (usize, VmaHandle)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.map(|h| (idx, h)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VmaList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{File, FileFlags, Inode, MemInode};
    use alloc::sync::Arc;

    const BASE: usize = 0x10_0000;

    fn vma(pages: usize, kind: MapKind) -> Vma {
        let inode = Arc::new(Inode::new(1, MemInode::from_bytes(&[])));
        Vma::new(
            VirtAddr::new(BASE),
            pages * PAGE_SIZE,
            VmaProt::READ | VmaProt::WRITE,
            kind,
            File::open(inode, FileFlags::new(FileFlags::O_RDWR)),
            0,
        )
    }

    #[test]
    fn test_vma_contains() {
        let v = vma(2, MapKind::Shared);
        assert!(v.contains(VirtAddr::new(BASE)));
        assert!(v.contains(VirtAddr::new(BASE + 2 * PAGE_SIZE - 1)));
        assert!(!v.contains(VirtAddr::new(BASE - 1)));
        assert!(!v.contains(VirtAddr::new(BASE + 2 * PAGE_SIZE)));
    }

    #[test]
    fn test_pte_flags() {
        let v = vma(1, MapKind::Private);
        assert_eq!(v.pte_flags(), PteFlags::U | PteFlags::R | PteFlags::W);
    }

    #[test]
    fn test_pte_flags_exec() {
        let inode = Arc::new(Inode::new(1, MemInode::from_bytes(&[])));
        let v = Vma::new(
            VirtAddr::new(BASE),
            PAGE_SIZE,
            VmaProt::READ | VmaProt::EXEC,
            MapKind::Private,
            File::open(inode, FileFlags::new(FileFlags::O_RDONLY)),
            0,
        );
        assert_eq!(v.pte_flags(), PteFlags::U | PteFlags::R | PteFlags::X);
        assert!(!v.pte_flags().contains(PteFlags::W));
    }

    #[test]
    fn test_classify_unmap() {
        let v = vma(4, MapKind::Shared);
        let at = |page: usize| VirtAddr::new(BASE + page * PAGE_SIZE);

        assert_eq!(v.classify_unmap(at(0), 4 * PAGE_SIZE), Ok(UnmapKind::Whole));
        assert_eq!(v.classify_unmap(at(0), PAGE_SIZE), Ok(UnmapKind::Head));
        assert_eq!(v.classify_unmap(at(3), PAGE_SIZE), Ok(UnmapKind::Tail));
        assert_eq!(v.classify_unmap(at(1), PAGE_SIZE), Err(VmaError::UnsupportedSplit));

        // 越界、空区间、非页粒度
        assert_eq!(v.classify_unmap(at(3), 2 * PAGE_SIZE), Err(VmaError::InvalidArgument));
        assert_eq!(v.classify_unmap(at(0), 0), Err(VmaError::InvalidArgument));
        assert_eq!(v.classify_unmap(at(0), 100), Err(VmaError::InvalidArgument));
        assert_eq!(
            v.classify_unmap(VirtAddr::new(BASE + 8), PAGE_SIZE),
            Err(VmaError::InvalidArgument)
        );
    }

    #[test]
    fn test_shrink_head_advances_offset() {
        let mut v = vma(4, MapKind::Shared);
        v.shrink(UnmapKind::Head, PAGE_SIZE);
        assert_eq!(v.start(), VirtAddr::new(BASE + PAGE_SIZE));
        assert_eq!(v.len(), 3 * PAGE_SIZE);
        assert_eq!(v.offset(), PAGE_SIZE as u64);
        assert_eq!(v.file_offset(VirtAddr::new(BASE + PAGE_SIZE)), PAGE_SIZE as u64);

        v.shrink(UnmapKind::Tail, PAGE_SIZE);
        assert_eq!(v.end(), VirtAddr::new(BASE + 3 * PAGE_SIZE));
    }

    #[test]
    fn test_dup_takes_file_reference() {
        let v = vma(1, MapKind::Shared);
        let d = v.dup();
        assert_eq!(Arc::strong_count(v.file()), 2);
        assert_eq!(d.start(), v.start());
        assert_eq!(d.len(), v.len());
        assert_eq!(d.prot(), v.prot());
        assert_eq!(d.kind(), v.kind());
        drop(v);
        assert_eq!(Arc::strong_count(d.file()), 1);
    }

    #[test]
    fn test_overlaps_rounds_to_pages() {
        let inode = Arc::new(Inode::new(1, MemInode::from_bytes(&[])));
        let v = Vma::new(
            VirtAddr::new(BASE),
            100,
            VmaProt::READ,
            MapKind::Private,
            File::open(inode, FileFlags::new(FileFlags::O_RDONLY)),
            0,
        );
        assert!(v.overlaps(VirtAddr::new(BASE + 200), VirtAddr::new(BASE + PAGE_SIZE)));
        assert!(!v.overlaps(VirtAddr::new(BASE + PAGE_SIZE), VirtAddr::new(BASE + 2 * PAGE_SIZE)));
        assert_eq!(v.page_count(), 1);
    }

    #[test]
    fn test_vma_list_capacity() {
        use crate::mm::vma_table::VmaTable;

        let table = VmaTable::new(NOVMA + 1);
        let mut list = VmaList::new();
        for _ in 0..NOVMA {
            let h = table.alloc(vma(1, MapKind::Private)).unwrap();
            list.insert(h).unwrap();
        }
        let extra = table.alloc(vma(1, MapKind::Private)).unwrap();
        assert_eq!(list.insert(extra), Err(VmaError::TooManyMappings));
        assert_eq!(list.len(), NOVMA);

        let (_, first) = list.iter().next().unwrap();
        assert!(list.remove(first));
        assert!(!list.remove(first));
        assert_eq!(list.insert(extra), Ok(0));
    }
}
