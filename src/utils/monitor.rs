#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub phase_time: Duration,
    pub elapsed_time: Duration,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    last_mark: Instant,
    peak_memory_mb: u64,
}

/// 以階段為單位記錄耗時與記憶體
#[cfg(feature = "cli")]
pub struct RunMonitor {
    state: Option<Mutex<MonitorState>>,
    pid: Option<Pid>,
    start_time: Instant,
}

#[cfg(feature = "cli")]
impl RunMonitor {
    pub fn new(enabled: bool) -> Self {
        let start_time = Instant::now();
        if !enabled {
            return Self {
                state: None,
                pid: None,
                start_time,
            };
        }

        let mut system = System::new();
        system.refresh_all();

        Self {
            state: Some(Mutex::new(MonitorState {
                system,
                last_mark: start_time,
                peak_memory_mb: 0,
            })),
            pid: sysinfo::get_current_pid().ok(),
            start_time,
        }
    }

    /// 結束一個階段，回傳該階段的統計
    pub fn mark(&self, phase: &str) -> Option<PhaseStats> {
        let mut state = self.state.as_ref()?.lock().ok()?;
        state.system.refresh_all();

        let memory_mb = self
            .pid
            .and_then(|pid| state.system.process(pid))
            .map(|process| process.memory() / 1024 / 1024)
            .unwrap_or(0);
        if memory_mb > state.peak_memory_mb {
            state.peak_memory_mb = memory_mb;
        }

        let now = Instant::now();
        let stats = PhaseStats {
            phase: phase.to_string(),
            phase_time: now.duration_since(state.last_mark),
            elapsed_time: now.duration_since(self.start_time),
            memory_usage_mb: memory_mb,
            peak_memory_mb: state.peak_memory_mb,
        };
        state.last_mark = now;

        tracing::info!(
            "📊 {} - took {:?}, Memory: {}MB, Peak: {}MB, Elapsed: {:?}",
            stats.phase,
            stats.phase_time,
            stats.memory_usage_mb,
            stats.peak_memory_mb,
            stats.elapsed_time
        );
        Some(stats)
    }

    pub fn log_final_stats(&self) {
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let peak = state.lock().map(|s| s.peak_memory_mb).unwrap_or(0);
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
            self.start_time.elapsed(),
            peak
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(feature = "cli")]
impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 非 CLI 環境的空實現
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct RunMonitor;

#[cfg(not(feature = "cli"))]
impl RunMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn mark(&self, _phase: &str) -> Option<()> {
        None
    }

    pub fn log_final_stats(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
