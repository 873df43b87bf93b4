//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! fork 时复制文件映射
//!
//! 子进程得到父进程每个描述符的副本（相同地址、权限、模式与偏移，
//! 独立的文件引用），放在映射表的相同位置。页面不复制：子进程访问时
//! 自己从文件装入。

use alloc::vec::Vec;
use log::{debug, warn};

use super::Process;
use crate::fs::file_close;
use crate::mm::pagemap::PageMapper;
use crate::mm::vma::VmaError;
use crate::mm::vma_table::VmaHandle;
use crate::mm::VmContext;

/// 把 `parent` 的映射复制到 `child`
///
/// 任何一个描述符复制失败时，已复制的描述符全部回收，子进程映射表
/// 恢复为调用前的状态。
pub fn copy_mmaps<P: PageMapper, Q: PageMapper>(
    ctx: &VmContext<'_>,
    parent: &Process<P>,
    child: &mut Process<Q>,
) -> Result<(), VmaError> {
    let mut copied: Vec<VmaHandle> = Vec::new();

    for (idx, handle) in parent.mmaps.iter() {
        let result = ctx.table.dup(handle).and_then(|dup| {
            copied.push(dup);
            child.mmaps.insert_at(idx, dup)
        });

        if let Err(err) = result {
            warn!(
                "fork: pid {} -> {} copy mmaps failed: {}",
                parent.pid(),
                child.pid(),
                err
            );
            for dup in copied {
                child.mmaps.remove(dup);
                if let Ok(vma) = ctx.table.dealloc(dup) {
                    file_close(vma.into_file());
                }
            }
            return Err(err);
        }
    }

    debug!(
        "fork: pid {} -> {} copied {} mmaps",
        parent.pid(),
        child.pid(),
        copied.len()
    );
    Ok(())
}
