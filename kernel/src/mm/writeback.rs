//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 共享映射写回
//!
//! 从进程内存读取数据并写入映射文件。每块不超过
//! [`max_write_bytes`] 字节，在一个事务内持 inode 锁完成，
//! 保证单个事务不会超出日志容量。

use alloc::sync::Arc;
use alloc::vec;
use log::{error, trace};

use super::page::{VirtAddr, PAGE_SIZE};
use super::pagemap::PageMapper;
use super::vma::VmaError;
use super::vma_table::VmaHandle;
use super::VmContext;
use crate::fs::{max_write_bytes, Transaction};
use crate::process::Process;

/// 把 `[addr, addr + n)` 的内容写回描述符对应的文件位置
///
/// 未驻留的页从未被访问过，没有需要写回的修改，直接跳过。
/// 某一块实际写入的字节数不足时返回 [`VmaError::PartialWrite`]，
/// 之前的块已经提交。
pub fn vma_write<P: PageMapper>(
    ctx: &VmContext<'_>,
    proc: &Process<P>,
    handle: VmaHandle,
    addr: VirtAddr,
    n: usize,
) -> Result<(), VmaError> {
    let (file, start, end, offset) = ctx.table.with(handle, |vma| {
        (Arc::clone(vma.file()), vma.start(), vma.end(), vma.offset())
    })?;
    let limit = addr.as_usize().checked_add(n).ok_or(VmaError::InvalidArgument)?;
    if addr < start || limit > end.as_usize() {
        return Err(VmaError::InvalidArgument);
    }

    let max = max_write_bytes();
    let mut buf = vec![0u8; max];
    let mut cur = addr.as_usize();

    while cur < limit {
        let next_page = (cur / PAGE_SIZE + 1) * PAGE_SIZE;
        if !proc.page_table.is_resident(VirtAddr::new(cur)) {
            cur = next_page;
            continue;
        }

        // 连续驻留的区间内按块写
        let mut run_end = core::cmp::min(next_page, limit);
        while run_end < limit && proc.page_table.is_resident(VirtAddr::new(run_end)) {
            run_end = core::cmp::min(run_end + PAGE_SIZE, limit);
        }

        while cur < run_end {
            let len = core::cmp::min(max, run_end - cur);
            let chunk = &mut buf[..len];
            proc.page_table.copy_from_user(VirtAddr::new(cur), chunk)?;

            let off = offset + (cur - start.as_usize()) as u64;
            let written = {
                let _tx = Transaction::begin(ctx.journal);
                let mut ip = file.inode().lock();
                ip.write_at(off, chunk)
            };
            trace!("writeback: ino {} off {} wrote {}/{}", file.inode().ino(), off, written, len);

            if written != len {
                error!(
                    "writeback: short write to ino {} at off {}: {} of {} bytes",
                    file.inode().ino(),
                    off,
                    written,
                    len
                );
                return Err(VmaError::PartialWrite);
            }
            cur += written;
        }
    }

    Ok(())
}
