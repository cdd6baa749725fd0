//! 播放队列控制器
//!
//! 维护曲目队列与播放器时间线一一对应，跟踪 prepared 状态，
//! 并在删除后修正窗口指针。

mod controller;
mod notice;

pub use controller::QueueController;
pub use notice::PlaybackNotice;
