//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 缺页处理：按需从文件装入页面
//!
//! 文件偏移只由地址计算得出：`offset + (round_down(addr) - start)`，
//! 与缺页发生的先后顺序无关。

use alloc::sync::Arc;
use alloc::vec;
use log::{debug, trace, warn};

use super::page::{VirtAddr, PAGE_SIZE};
use super::pagemap::PageMapper;
use super::vma::{VmaError, VmaProt};
use super::vma_table::VmaHandle;
use super::VmContext;
use crate::process::Process;

/// 触发缺页的访问类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

/// 在进程自己的映射表中查找覆盖 `addr` 的描述符
pub fn resolve<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &Process<P>,
    addr: VirtAddr,
) -> Option<VmaHandle> {
    proc.mmaps
        .iter()
        .map(|(_, handle)| handle)
        .find(|&handle| ctx.table.with(handle, |vma| vma.contains(addr)).unwrap_or(false))
}

/// 为 `addr` 所在页分配物理页、安装页表项并从文件读入内容
///
/// 文件末尾之后的部分保持为零。
pub fn load_page<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &mut Process<P>,
    addr: VirtAddr,
) -> Result<(), VmaError> {
    let handle = resolve(ctx, proc, addr).ok_or(VmaError::NoMapping)?;
    let page = addr.floor();

    // 复制出 I/O 需要的信息，读文件时不持有槽位锁
    let (flags, file, off) = ctx.table.with(handle, |vma| {
        (vma.pte_flags(), Arc::clone(vma.file()), vma.file_offset(page))
    })?;

    let frame = ctx.frames.alloc_zeroed().ok_or(VmaError::OutOfMemory)?;
    if let Err(err) = proc.page_table.map_pages(page, PAGE_SIZE, frame, flags) {
        warn!(
            "fault: pid {} install 0x{:x} failed: {:?}",
            proc.pid(),
            page,
            err
        );
        ctx.frames.dealloc(frame);
        return Err(VmaError::MapInstallFailed);
    }

    let mut buf = vec![0u8; PAGE_SIZE];
    let n = file.read_at(off, &mut buf);
    if n < PAGE_SIZE {
        debug!("fault: short read at off {} ({} of {} bytes)", off, n, PAGE_SIZE);
    }
    proc.page_table.copy_to_user(page, &buf[..n])?;

    trace!(
        "fault: pid {} loaded 0x{:x} from ino {} off {}",
        proc.pid(),
        page,
        file.inode().ino(),
        off
    );
    Ok(())
}

/// 用户态缺页入口
///
/// 只处理按需装入：地址必须在某个映射内、访问类型被映射允许、
/// 且该页尚未驻留。
pub fn handle_page_fault<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &mut Process<P>,
    addr: VirtAddr,
    access: AccessKind,
) -> Result<(), VmaError> {
    let handle = resolve(ctx, proc, addr).ok_or(VmaError::NoMapping)?;
    let prot = ctx.table.with(handle, |vma| vma.prot())?;

    let needed = match access {
        AccessKind::Read => VmaProt::READ,
        AccessKind::Write => VmaProt::WRITE,
    };
    if !prot.contains(needed) {
        return Err(VmaError::PermissionDenied);
    }
    if proc.page_table.is_resident(addr) {
        return Err(VmaError::InvalidArgument);
    }

    load_page(ctx, proc, addr)
}
