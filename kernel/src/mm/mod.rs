//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 内存管理模块
//!
//! 按需分页的文件映射：
//! - `vma` / `vma_table`: 映射描述符与全局描述符表
//! - `fault`: 缺页时从文件装入一页
//! - `munmap`: 解除映射，共享映射先写回
//! - `writeback`: 按事务大小分块写回文件
//! - `mmap`: mmap / munmap 系统调用
//! - `frame` / `pagemap`: 物理页与页表接口

pub mod fault;
pub mod frame;
pub mod mmap;
pub mod munmap;
pub mod page;
pub mod pagemap;
pub mod vma;
pub mod vma_table;
pub mod writeback;

use lazy_static::lazy_static;

use crate::config::NVMA;
use crate::fs::Journal;

pub use fault::{handle_page_fault, load_page, resolve, AccessKind};
pub use frame::{FrameAllocator, FrameArena};
pub use mmap::{do_mmap, do_munmap, sys_mmap, sys_munmap};
pub use munmap::vma_unmap;
pub use page::{page_round_down, page_round_up, PhysFrame, VirtAddr, PAGE_SIZE};
pub use pagemap::{MapError, PageMapper, PteFlags, SoftPageTable};
pub use vma::{MapKind, UnmapKind, Vma, VmaError, VmaList, VmaProt};
pub use vma_table::{VmaHandle, VmaTable};
pub use writeback::vma_write;

lazy_static! {
    /// 内核全局的映射描述符表
    pub static ref VMA_TABLE: VmaTable = VmaTable::new(NVMA);
}

/// 映射操作所需的内核共享资源
#[derive(Clone, Copy)]
pub struct VmContext<'a> {
    pub table: &'a VmaTable,
    pub frames: &'a dyn FrameAllocator,
    pub journal: &'a dyn Journal,
}

impl<'a> VmContext<'a> {
    pub fn new(
        table: &'a VmaTable,
        frames: &'a dyn FrameAllocator,
        journal: &'a dyn Journal,
    ) -> Self {
        Self {
            table,
            frames,
            journal,
        }
    }

    /// 使用全局描述符表
    pub fn global(frames: &'a dyn FrameAllocator, journal: &'a dyn Journal) -> VmContext<'a> {
        VmContext::new(&VMA_TABLE, frames, journal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{File, FileFlags, Inode, MemInode, OpLog};
    use alloc::sync::Arc;

    #[test]
    fn test_global_table() {
        let frames = FrameArena::new(1);
        let journal = OpLog::new();
        let ctx = VmContext::global(&frames, &journal);
        assert_eq!(ctx.table.capacity(), NVMA);
        assert_eq!(VMA_TABLE.capacity(), NVMA);

        let inode = Arc::new(Inode::new(1, MemInode::from_bytes(b"global")));
        let file = File::open(inode, FileFlags::new(FileFlags::O_RDONLY));
        let vma = Vma::new(
            VirtAddr::new(crate::config::MMAP_BASE),
            PAGE_SIZE,
            VmaProt::READ,
            MapKind::Private,
            crate::fs::file_dup(&file),
            0,
        );
        let handle = ctx.table.alloc(vma).unwrap();
        assert_eq!(VMA_TABLE.with(handle, |v| v.start().as_usize()), Ok(crate::config::MMAP_BASE));

        drop(ctx.table.dealloc(handle).unwrap());
        assert_eq!(Arc::strong_count(&file), 1);
    }
}
