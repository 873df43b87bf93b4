//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! mmap / munmap 系统调用
//!
//! mmap 只建立描述符，不安装任何页面：页面在第一次访问时由缺页处理装入。
//! 映射地址在 `[MMAP_BASE, MMAP_TOP)` 内自顶向下选择。

use alloc::vec::Vec;
use log::debug;

use super::fault::resolve;
use super::munmap::vma_unmap;
use super::page::{checked_page_round_up, page_round_up, VirtAddr, PAGE_SIZE};
use super::pagemap::PageMapper;
use super::vma::{MapKind, Vma, VmaError, VmaProt};
use super::VmContext;
use crate::config::{MMAP_BASE, MMAP_TOP};
use crate::errno::Errno;
use crate::fs::{file_close, file_dup, FileHandle};
use crate::process::Process;

// mmap 保护标志
pub const PROT_NONE: u32 = 0x0;
pub const PROT_READ: u32 = 0x1;
pub const PROT_WRITE: u32 = 0x2;
pub const PROT_EXEC: u32 = 0x4;

// mmap 映射标志
pub const MAP_SHARED: u32 = 0x01;
pub const MAP_PRIVATE: u32 = 0x02;

/// 自顶向下寻找能放下 `size` 字节且不与已有映射重叠的区间
fn find_free_area<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &Process<P>,
    size: usize,
) -> Result<VirtAddr, VmaError> {
    if size > MMAP_TOP - MMAP_BASE {
        return Err(VmaError::OutOfMemory);
    }

    let mut ranges: Vec<(usize, usize)> = proc
        .mmaps
        .iter()
        .filter_map(|(_, handle)| {
            ctx.table
                .with(handle, |vma| {
                    (vma.start().as_usize(), page_round_up(vma.end().as_usize()))
                })
                .ok()
        })
        .collect();
    ranges.sort_unstable_by(|a, b| b.1.cmp(&a.1));

    let mut top = MMAP_TOP;
    for (start, end) in ranges {
        if end.saturating_add(size) <= top {
            break;
        }
        top = core::cmp::min(top, start);
    }

    if top < MMAP_BASE + size {
        return Err(VmaError::OutOfMemory);
    }
    Ok(VirtAddr::new(top - size))
}

/// 建立文件映射，返回映射起始地址
pub fn do_mmap<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &mut Process<P>,
    len: usize,
    prot: u32,
    flags: u32,
    file: &FileHandle,
    offset: u64,
) -> Result<VirtAddr, VmaError> {
    if len == 0 || offset % PAGE_SIZE as u64 != 0 {
        return Err(VmaError::InvalidArgument);
    }

    let kind = match (flags & MAP_SHARED != 0, flags & MAP_PRIVATE != 0) {
        (true, false) => MapKind::Shared,
        (false, true) => MapKind::Private,
        _ => return Err(VmaError::InvalidArgument),
    };
    let prot = VmaProt::from_bits(prot).ok_or(VmaError::InvalidArgument)?;

    if prot.contains(VmaProt::READ) && !file.readable() {
        return Err(VmaError::PermissionDenied);
    }
    // 私有映射的修改不会写回，只读文件也可以可写地私有映射
    if prot.contains(VmaProt::WRITE) && kind == MapKind::Shared && !file.writable() {
        return Err(VmaError::PermissionDenied);
    }

    let size = checked_page_round_up(len).ok_or(VmaError::OutOfMemory)?;
    let addr = find_free_area(ctx, proc, size)?;
    let vma = Vma::new(addr, len, prot, kind, file_dup(file), offset);
    let handle = ctx.table.alloc(vma)?;

    if let Err(err) = proc.mmaps.insert(handle) {
        let vma = ctx.table.dealloc(handle)?;
        file_close(vma.into_file());
        return Err(err);
    }

    debug!(
        "mmap: pid {} 0x{:x}+{} {:?} {:?} ino {} off {}",
        proc.pid(),
        addr,
        len,
        prot,
        kind,
        file.inode().ino(),
        offset
    );
    Ok(addr)
}

/// 解除 `[addr, addr + len)` 的映射
///
/// 区间必须落在同一个映射内。`len` 向上对齐到页，超出映射末尾的
/// 部分（最后一页的空余）截掉。
pub fn do_munmap<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &mut Process<P>,
    addr: VirtAddr,
    len: usize,
) -> Result<(), VmaError> {
    if !addr.is_aligned() || len == 0 {
        return Err(VmaError::InvalidArgument);
    }

    let handle = resolve(ctx, proc, addr).ok_or(VmaError::NoMapping)?;
    let end = ctx.table.with(handle, |vma| vma.end().as_usize())?;

    let want = checked_page_round_up(len).ok_or(VmaError::InvalidArgument)?;
    if want > page_round_up(end) - addr.as_usize() {
        return Err(VmaError::InvalidArgument);
    }
    let n = core::cmp::min(want, end - addr.as_usize());

    vma_unmap(ctx, proc, handle, addr, n)
}

/// mmap 系统调用：成功返回映射地址，失败返回负的错误码
pub fn sys_mmap<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &mut Process<P>,
    len: usize,
    prot: u32,
    flags: u32,
    file: &FileHandle,
    offset: usize,
) -> isize {
    match do_mmap(ctx, proc, len, prot, flags, file, offset as u64) {
        Ok(addr) => addr.as_usize() as isize,
        Err(err) => Errno::from(err).as_neg_isize(),
    }
}

/// munmap 系统调用：成功返回 0，失败返回负的错误码
pub fn sys_munmap<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &mut Process<P>,
    addr: usize,
    len: usize,
) -> isize {
    match do_munmap(ctx, proc, VirtAddr::new(addr), len) {
        Ok(()) => 0,
        Err(err) => Errno::from(err).as_neg_isize(),
    }
}
