//! 启动门闸：宿主运行时就绪前登记的初始化动作，就绪后执行且只执行一次

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// 只触发一次的延续；触发后自动丢弃闭包
pub struct OnceContinuation {
    fired: AtomicBool,
    task: Mutex<Option<Task>>,
}

impl OnceContinuation {
    pub fn new(task: impl FnOnce() + Send + 'static) -> Self {
        Self {
            fired: AtomicBool::new(false),
            task: Mutex::new(Some(Box::new(task))),
        }
    }

    /// 返回本次调用是否真正执行了闭包
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        let task = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for OnceContinuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceContinuation")
            .field("fired", &self.has_fired())
            .finish()
    }
}

#[derive(Default)]
struct GateInner {
    ready: AtomicBool,
    pending: Mutex<Vec<OnceContinuation>>,
}

#[derive(Clone, Default)]
pub struct ReadinessGate {
    inner: Arc<GateInner>,
}

impl fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已经就绪的门闸
    pub fn ready() -> Self {
        let gate = Self::new();
        gate.inner.ready.store(true, Ordering::SeqCst);
        gate
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// 已就绪则立即执行，否则登记到就绪时执行
    pub fn run_when_ready(&self, task: impl FnOnce() + Send + 'static) {
        let cont = OnceContinuation::new(task);
        {
            let mut pending = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if !self.is_ready() {
                pending.push(cont);
                tracing::debug!(pending = pending.len(), "宿主未就绪，延迟初始化");
                return;
            }
        }
        cont.fire();
    }

    /// 标记就绪并执行所有登记的动作；重复调用不会重复执行。返回本次执行的数量。
    pub fn mark_ready(&self) -> usize {
        let drained = {
            let mut pending = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            self.inner.ready.store(true, Ordering::SeqCst);
            std::mem::take(&mut *pending)
        };
        drained.iter().filter(|c| c.fire()).count()
    }
}
