//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 进程退出时回收文件映射

use alloc::vec::Vec;
use log::{debug, error};

use super::Process;
use crate::mm::munmap::{vma_retire, vma_unmap};
use crate::mm::pagemap::PageMapper;
use crate::mm::vma_table::VmaHandle;
use crate::mm::VmContext;

/// 整个移除进程的每个映射，共享映射照常写回
///
/// 写回失败只记录日志，映射仍被强制回收，不泄漏槽位和文件引用。
pub fn exit_mmaps<P: PageMapper>(ctx: &VmContext<'_>, proc: &mut Process<P>) {
    let handles: Vec<VmaHandle> = proc.mmaps.iter().map(|(_, handle)| handle).collect();

    for handle in handles {
        let result = ctx
            .table
            .with(handle, |vma| (vma.start(), vma.len()))
            .and_then(|(start, len)| vma_unmap(ctx, proc, handle, start, len));

        if let Err(err) = result {
            error!(
                "exit: pid {} unmap {:?} failed: {}, forcing teardown",
                proc.pid(),
                handle,
                err
            );
            vma_retire(ctx, proc, handle);
        }
    }

    debug!("exit: pid {} mmaps released", proc.pid());
}
