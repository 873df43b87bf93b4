//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 物理页帧分配接口
//!
//! 文件映射子系统只依赖 [`FrameAllocator`]：缺页时申请一个清零的页，
//! 安装失败时归还。[`FrameArena`] 是一个软件实现，页帧内容保存在内核堆上，
//! 供主机端构建与测试使用。

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use log::warn;
use spin::Mutex;

use super::page::{PhysFrame, PhysFrameNr, PAGE_SIZE};

/// 物理页分配器
///
/// 实现必须允许不相关的进程并发调用
pub trait FrameAllocator: Sync {
    /// 分配一个内容全零的物理页，耗尽时返回 `None`
    fn alloc_zeroed(&self) -> Option<PhysFrame>;

    /// 归还物理页
    fn dealloc(&self, frame: PhysFrame);
}

struct ArenaInner {
    /// 尚未分配过的最小帧号（bump 分配）
    next_free: PhysFrameNr,
    /// 已释放可复用的帧号
    free_list: Vec<PhysFrameNr>,
    /// 帧内容，按帧号索引
    frames: Vec<Option<Box<[u8]>>>,
}

/// 固定容量的软件页帧池
pub struct FrameArena {
    inner: Mutex<ArenaInner>,
    total_frames: usize,
}

impl FrameArena {
    pub fn new(total_frames: usize) -> Self {
        let mut frames = Vec::with_capacity(total_frames);
        frames.resize_with(total_frames, || None);
        Self {
            inner: Mutex::new(ArenaInner {
                next_free: 0,
                free_list: Vec::new(),
                frames,
            }),
            total_frames,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// 当前已分配的帧数
    pub fn allocated(&self) -> usize {
        let inner = self.inner.lock();
        inner.frames.iter().filter(|f| f.is_some()).count()
    }

    /// 以可变切片的形式访问一个已分配帧的内容
    pub fn with_frame<R>(&self, frame: PhysFrame, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        let data = inner.frames.get_mut(frame.number)?.as_deref_mut()?;
        Some(f(data))
    }
}

impl FrameAllocator for FrameArena {
    fn alloc_zeroed(&self) -> Option<PhysFrame> {
        let mut inner = self.inner.lock();

        // 1. 首先尝试从空闲链表中分配
        let number = match inner.free_list.pop() {
            Some(number) => number,
            None => {
                // 2. 空闲链表为空，使用 bump 分配器
                if inner.next_free >= self.total_frames {
                    return None;
                }
                let number = inner.next_free;
                inner.next_free += 1;
                number
            }
        };

        inner.frames[number] = Some(vec![0u8; PAGE_SIZE].into_boxed_slice());
        Some(PhysFrame::new(number))
    }

    fn dealloc(&self, frame: PhysFrame) {
        let mut inner = self.inner.lock();
        match inner.frames.get_mut(frame.number) {
            Some(slot @ Some(_)) => {
                *slot = None;
                inner.free_list.push(frame.number);
            }
            _ => warn!("frame: dealloc of unallocated frame {}", frame.number),
        }
    }
}
