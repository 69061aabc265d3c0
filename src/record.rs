//! Recording trigger interface.
//!
//! The monitor starts a recorder when the alert state reaches DANGER (or a manual
//! override is on) and stops it when neither holds. Encoding and storage belong to
//! the `Recorder` implementation; `ClipJournal` only tracks clip sessions.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::frame::Frame;

/// Finished clips kept by `ClipJournal` by default.
pub const DEFAULT_CLIP_HISTORY: usize = 4;

/// Video-writing collaborator.
pub trait Recorder: Send {
    /// Begin a clip for frames of the given size. No-op while already recording.
    fn start(&mut self, width: u32, height: u32) -> Result<()>;

    /// Append a frame to the current clip.
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Finish the current clip. No-op while idle.
    fn stop(&mut self) -> Result<()>;

    fn is_recording(&self) -> bool;
}

/// Summary of one recorded clip.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClipSummary {
    /// Sequence number, starting at 1.
    pub id: u64,
    /// Wall-clock start, seconds since the epoch. Display only.
    pub started_epoch_s: u64,
    pub width: u32,
    pub height: u32,
    pub frames: u64,
    pub duration: Duration,
}

struct ActiveClip {
    id: u64,
    started_epoch_s: u64,
    started: Instant,
    width: u32,
    height: u32,
    frames: u64,
}

/// Recorder that keeps clip metadata only: the active clip plus the most recent
/// finished ones, newest first.
pub struct ClipJournal {
    capacity: usize,
    next_id: u64,
    active: Option<ActiveClip>,
    recent: VecDeque<ClipSummary>,
}

impl ClipJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: 1,
            active: None,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    /// Finished clips, newest first.
    pub fn recent(&self) -> impl Iterator<Item = &ClipSummary> {
        self.recent.iter()
    }

    /// Clips started so far, including the active one.
    pub fn clips_started(&self) -> u64 {
        self.next_id - 1
    }

    pub fn active_frames(&self) -> Option<u64> {
        self.active.as_ref().map(|clip| clip.frames)
    }
}

impl Default for ClipJournal {
    fn default() -> Self {
        Self::new(DEFAULT_CLIP_HISTORY)
    }
}

impl Recorder for ClipJournal {
    fn start(&mut self, width: u32, height: u32) -> Result<()> {
        if self.active.is_some() {
            return Ok(());
        }
        let started_epoch_s = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let id = self.next_id;
        self.next_id += 1;
        self.active = Some(ActiveClip {
            id,
            started_epoch_s,
            started: Instant::now(),
            width,
            height,
            frames: 0,
        });
        log::info!("clip #{} started ({}x{})", id, width, height);
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        let clip = self
            .active
            .as_mut()
            .ok_or_else(|| anyhow!("no clip is being recorded"))?;
        if (frame.width(), frame.height()) != (clip.width, clip.height) {
            return Err(anyhow!(
                "frame size {}x{} does not match clip {}x{}",
                frame.width(),
                frame.height(),
                clip.width,
                clip.height
            ));
        }
        clip.frames += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(clip) = self.active.take() else {
            return Ok(());
        };
        let summary = ClipSummary {
            id: clip.id,
            started_epoch_s: clip.started_epoch_s,
            width: clip.width,
            height: clip.height,
            frames: clip.frames,
            duration: clip.started.elapsed(),
        };
        log::info!(
            "clip #{} finished: {} frames in {:.1}s",
            summary.id,
            summary.frames,
            summary.duration.as_secs_f64()
        );
        if self.capacity > 0 {
            while self.recent.len() >= self.capacity {
                self.recent.pop_back();
            }
            self.recent.push_front(summary);
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.active.is_some()
    }
}

/// Shared handle, so the owner can inspect a recorder the monitor drives.
impl<R: Recorder> Recorder for Arc<Mutex<R>> {
    fn start(&mut self, width: u32, height: u32) -> Result<()> {
        lock(self)?.start(width, height)
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        lock(self)?.write(frame)
    }

    fn stop(&mut self) -> Result<()> {
        lock(self)?.stop()
    }

    fn is_recording(&self) -> bool {
        lock(self).map(|r| r.is_recording()).unwrap_or(false)
    }
}

fn lock<R>(shared: &Mutex<R>) -> Result<MutexGuard<'_, R>> {
    shared
        .lock()
        .map_err(|_| anyhow!("recorder lock poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_counts_frames_per_clip() {
        let mut journal = ClipJournal::default();
        let frame = Frame::uniform(32, 24, 10).unwrap();

        assert!(journal.write(&frame).is_err());
        journal.start(32, 24).unwrap();
        journal.start(32, 24).unwrap();
        assert!(journal.is_recording());
        for _ in 0..3 {
            journal.write(&frame).unwrap();
        }
        assert_eq!(journal.active_frames(), Some(3));
        journal.stop().unwrap();
        assert!(!journal.is_recording());

        let recent: Vec<_> = journal.recent().collect();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, 1);
        assert_eq!(recent[0].frames, 3);
        assert_eq!(journal.clips_started(), 1);
    }

    #[test]
    fn journal_keeps_newest_clips() {
        let mut journal = ClipJournal::new(2);
        for _ in 0..3 {
            journal.start(8, 8).unwrap();
            journal.stop().unwrap();
        }
        let ids: Vec<u64> = journal.recent().map(|clip| clip.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn journal_rejects_mismatched_frames() {
        let mut journal = ClipJournal::default();
        journal.start(8, 8).unwrap();
        assert!(journal.write(&Frame::uniform(16, 8, 0).unwrap()).is_err());
    }

    #[test]
    fn shared_journal_is_visible_to_owner() {
        let shared = Arc::new(Mutex::new(ClipJournal::default()));
        let mut handle: Box<dyn Recorder> = Box::new(Arc::clone(&shared));
        handle.start(8, 8).unwrap();
        handle.write(&Frame::uniform(8, 8, 1).unwrap()).unwrap();
        assert!(handle.is_recording());
        handle.stop().unwrap();
        assert_eq!(shared.lock().unwrap().recent().count(), 1);
    }
}
