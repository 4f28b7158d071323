use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PauseReason {
    User,
    Completion,
}

/// Timer and scroll state of one reading session.
///
/// Completion fires once per upward crossing of the threshold: it disarms
/// when it fires and re-arms only after the percentage drops below the
/// threshold again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingState {
    pub status: TimerStatus,
    pub pause_reason: Option<PauseReason>,
    /// Seconds.
    pub time_spent: u64,
    pub scroll_position: f64,
    pub percentage: f64,
    pub completed: bool,
    #[serde(skip)]
    completion_armed: bool,
    #[serde(skip)]
    threshold: f64,
}

impl ReadingState {
    pub fn new(threshold: f64) -> Self {
        Self {
            status: TimerStatus::Idle,
            pause_reason: None,
            time_spent: 0,
            scroll_position: 0.0,
            percentage: 0.0,
            completed: false,
            completion_armed: true,
            threshold,
        }
    }

    pub fn seed(&mut self, time_spent: u64, completed: bool) {
        self.time_spent = time_spent;
        self.completed = completed;
    }

    pub fn start(&mut self) {
        if self.status == TimerStatus::Idle {
            self.status = TimerStatus::Running;
        }
    }

    /// One second of wall clock. Counts only while running and visible.
    pub fn tick(&mut self, visible: bool) -> bool {
        if self.status == TimerStatus::Running && visible {
            self.time_spent += 1;
            true
        } else {
            false
        }
    }

    /// Jump to a stored position without treating it as a threshold crossing.
    pub fn restore(&mut self, scroll_position: f64, percentage: f64) {
        self.scroll_position = scroll_position;
        self.percentage = percentage;
        self.completion_armed = percentage < self.threshold;
    }

    /// Records a scroll; returns true when this scroll completes the article.
    pub fn observe(&mut self, scroll_position: f64, percentage: f64) -> bool {
        self.scroll_position = scroll_position;
        self.percentage = percentage;

        if percentage < self.threshold {
            self.completion_armed = true;
            return false;
        }
        self.completed = true;
        if self.completion_armed && self.status == TimerStatus::Running {
            self.completion_armed = false;
            self.status = TimerStatus::Paused;
            self.pause_reason = Some(PauseReason::Completion);
            return true;
        }
        false
    }

    pub fn pause(&mut self) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }
        self.status = TimerStatus::Paused;
        self.pause_reason = Some(PauseReason::User);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.status != TimerStatus::Paused {
            return false;
        }
        self.status = TimerStatus::Running;
        self.pause_reason = None;
        true
    }

    pub fn toggle(&mut self) -> TimerStatus {
        if !self.pause() {
            self.resume();
        }
        self.status
    }

    /// "Revise" from the completion prompt: back to the top with a fresh timer.
    pub fn revise(&mut self) {
        self.time_spent = 0;
        self.scroll_position = 0.0;
        self.percentage = 0.0;
        self.completion_armed = true;
        self.status = TimerStatus::Running;
        self.pause_reason = None;
    }

    pub fn awaiting_completion_choice(&self) -> bool {
        self.pause_reason == Some(PauseReason::Completion)
    }
}
