//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 解除映射
//!
//! 只支持从映射的开头或结尾移除，或整个移除；在中间挖洞会把一个
//! 映射拆成两个，返回 [`VmaError::UnsupportedSplit`] 且不修改任何状态。
//! 共享映射先写回，再移除页表项。

use log::{debug, warn};

use super::page::{page_round_up, VirtAddr, PAGE_SIZE};
use super::pagemap::PageMapper;
use super::vma::{UnmapKind, VmaError};
use super::vma_table::VmaHandle;
use super::writeback::vma_write;
use super::VmContext;
use crate::fs::file_close;
use crate::process::Process;

/// 从描述符 `handle` 中移除 `[addr, addr + n)`
///
/// 写回失败时映射保持原样。
pub fn vma_unmap<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &mut Process<P>,
    handle: VmaHandle,
    addr: VirtAddr,
    n: usize,
) -> Result<(), VmaError> {
    if !proc.mmaps.contains(handle) {
        return Err(VmaError::NoMapping);
    }
    let (kind, shared) = ctx
        .table
        .with(handle, |vma| vma.classify_unmap(addr, n).map(|kind| (kind, vma.is_shared())))??;

    if shared {
        vma_write(ctx, proc, handle, addr, n)?;
    }

    let npages = (page_round_up(addr.as_usize() + n) - addr.as_usize()) / PAGE_SIZE;
    proc.page_table.unmap_pages(addr, npages, true);

    match kind {
        UnmapKind::Whole => {
            proc.mmaps.remove(handle);
            let vma = ctx.table.dealloc(handle)?;
            file_close(vma.into_file());
        }
        UnmapKind::Head | UnmapKind::Tail => {
            ctx.table.with_mut(handle, |vma| vma.shrink(kind, n))?;
        }
    }

    debug!(
        "munmap: pid {} 0x{:x}+{} {:?}",
        proc.pid(),
        addr,
        n,
        kind
    );
    Ok(())
}

/// 不写回，直接移除整个映射并回收描述符
pub(crate) fn vma_retire<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &mut Process<P>,
    handle: VmaHandle,
) {
    proc.mmaps.remove(handle);
    match ctx.table.dealloc(handle) {
        Ok(vma) => {
            proc.page_table.unmap_pages(vma.start(), vma.page_count(), true);
            file_close(vma.into_file());
        }
        Err(err) => warn!("munmap: pid {} retire {:?}: {}", proc.pid(), handle, err),
    }
}
