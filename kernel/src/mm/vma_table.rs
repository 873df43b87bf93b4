//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 全局映射描述符表
//!
//! 固定容量的槽位数组，整个内核共享。占用位图由一把池锁保护，
//! 分配（扫描并占用）与释放都在池锁下完成；每个槽位另有自己的锁，
//! 保护描述符内容。加锁顺序固定为 池锁 -> 槽位锁。
//!
//! 槽位通过 [`VmaHandle`] 引用。句柄携带代数 (generation)，槽位每次
//! 释放代数加一，过期句柄会被拒绝而不是访问到复用后的描述符。

use alloc::vec::Vec;
use log::trace;
use spin::Mutex;

use super::vma::{Vma, VmaError};

/// 描述符句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VmaHandle {
    index: u32,
    generation: u32,
}

impl VmaHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct Slot {
    generation: u32,
    vma: Option<Vma>,
}

/// 描述符表
pub struct VmaTable {
    /// 池锁：槽位占用位图
    used: Mutex<Vec<bool>>,
    slots: Vec<Mutex<Slot>>,
}

impl VmaTable {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || {
            Mutex::new(Slot {
                generation: 0,
                vma: None,
            })
        });
        let mut used = Vec::with_capacity(capacity);
        used.resize(capacity, false);

        Self {
            used: Mutex::new(used),
            slots,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 当前占用的槽位数
    pub fn in_use(&self) -> usize {
        self.used.lock().iter().filter(|&&u| u).count()
    }

    /// 占用一个空闲槽位并放入 `vma`
    ///
    /// 表满时返回 [`VmaError::PoolExhausted`]，`vma` 随之析构，
    /// 其持有的文件引用一并释放。
    pub fn alloc(&self, vma: Vma) -> Result<VmaHandle, VmaError> {
        let mut used = self.used.lock();
        let index = used
            .iter()
            .position(|&u| !u)
            .ok_or(VmaError::PoolExhausted)?;
        used[index] = true;

        let mut slot = self.slots[index].lock();
        slot.vma = Some(vma);
        let handle = VmaHandle {
            index: index as u32,
            generation: slot.generation,
        };
        trace!("vma: alloc slot {} gen {}", index, slot.generation);
        Ok(handle)
    }

    /// 释放槽位并交还描述符
    ///
    /// 不关闭文件：调用方拿到描述符后自行 `file_close`。
    pub fn dealloc(&self, handle: VmaHandle) -> Result<Vma, VmaError> {
        let mut used = self.used.lock();
        let mut slot = self
            .slots
            .get(handle.index())
            .ok_or(VmaError::StaleHandle)?
            .lock();
        if slot.generation != handle.generation {
            return Err(VmaError::StaleHandle);
        }
        let vma = slot.vma.take().ok_or(VmaError::StaleHandle)?;
        slot.generation = slot.generation.wrapping_add(1);
        used[handle.index()] = false;
        trace!("vma: release slot {}", handle.index());
        Ok(vma)
    }

    /// 复制描述符到新槽位，新描述符持有独立的文件引用
    pub fn dup(&self, handle: VmaHandle) -> Result<VmaHandle, VmaError> {
        let copy = self.with(handle, |vma| vma.dup())?;
        self.alloc(copy)
    }

    /// 在槽位锁下只读访问描述符
    pub fn with<R>(&self, handle: VmaHandle, f: impl FnOnce(&Vma) -> R) -> Result<R, VmaError> {
        let slot = self
            .slots
            .get(handle.index())
            .ok_or(VmaError::StaleHandle)?
            .lock();
        match slot.vma.as_ref() {
            Some(vma) if slot.generation == handle.generation => Ok(f(vma)),
            _ => Err(VmaError::StaleHandle),
        }
    }

    /// 在槽位锁下修改描述符
    pub fn with_mut<R>(
        &self,
        handle: VmaHandle,
        f: impl FnOnce(&mut Vma) -> R,
    ) -> Result<R, VmaError> {
        let mut slot = self
            .slots
            .get(handle.index())
            .ok_or(VmaError::StaleHandle)?
            .lock();
        let generation = slot.generation;
        match slot.vma.as_mut() {
            Some(vma) if generation == handle.generation => Ok(f(vma)),
            _ => Err(VmaError::StaleHandle),
        }
    }
}
