/*!
 * Scheduler Configuration
 *
 * Boot-time configuration for scheduling mode, time slice and timer rates
 */

use super::errors::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// Scheduling mode, fixed at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchedulerMode {
    /// Strict priority with round-robin among equals and priority donation
    #[default]
    Priority,
    /// Multi-level feedback queue, priorities derived from nice and recent CPU
    Mlfqs,
}

impl SchedulerMode {
    /// Convert to string representation
    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Mlfqs => "mlfqs",
        }
    }

    #[inline(always)]
    pub const fn is_mlfqs(&self) -> bool {
        matches!(self, Self::Mlfqs)
    }
}

impl FromStr for SchedulerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "priority" | "prio" | "rr" | "round_robin" => Ok(Self::Priority),
            "mlfqs" | "mlfq" => Ok(Self::Mlfqs),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

impl Serialize for SchedulerMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SchedulerMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedConfig {
    /// Scheduling mode
    pub mode: SchedulerMode,
    /// Ticks a thread may run before it is preempted
    pub time_slice: u32,
    /// Timer interrupts per second
    pub timer_freq: u32,
    /// Ticks between MLFQS priority recomputations
    pub priority_interval: u32,
    /// Upper bound on live threads, including main and idle
    pub max_threads: usize,
    /// Stack size of the host thread backing each kernel thread
    pub stack_size: usize,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::priority()
    }
}

impl SchedConfig {
    /// Priority scheduling with donation
    pub const fn priority() -> Self {
        Self {
            mode: SchedulerMode::Priority,
            time_slice: 4,
            timer_freq: 100,
            priority_interval: 4,
            max_threads: 256,
            stack_size: 256 * 1024,
        }
    }

    /// Multi-level feedback queue scheduling
    pub const fn mlfqs() -> Self {
        Self {
            mode: SchedulerMode::Mlfqs,
            ..Self::priority()
        }
    }

    /// Reject values the scheduler cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&str, usize); 4] = [
            ("time_slice", self.time_slice as usize),
            ("timer_freq", self.timer_freq as usize),
            ("priority_interval", self.priority_interval as usize),
            ("stack_size", self.stack_size),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(invalid(key, value));
            }
        }
        // main and idle always exist
        if self.max_threads < 2 {
            return Err(invalid("max_threads", self.max_threads));
        }
        Ok(())
    }

    /// Defaults overridden from the environment
    ///
    /// Environment variables:
    /// - KERNEL_SCHED_MODE: priority | mlfqs
    /// - KERNEL_TIME_SLICE: ticks per slice
    /// - KERNEL_TIMER_FREQ: ticks per second
    /// - KERNEL_MAX_THREADS: live thread limit
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(mode) = std::env::var("KERNEL_SCHED_MODE") {
            config.mode = mode.parse()?;
        }
        if let Some(slice) = env_number("KERNEL_TIME_SLICE")? {
            config.time_slice = slice;
        }
        if let Some(freq) = env_number("KERNEL_TIMER_FREQ")? {
            config.timer_freq = freq;
        }
        if let Some(max) = env_number("KERNEL_MAX_THREADS")? {
            config.max_threads = max;
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply kernel command-line options (`-o mlfqs`)
    pub fn apply_cmdline<I, S>(mut self, args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_ref() {
                "-o" => match args.next() {
                    Some(opt) if opt.as_ref() == "mlfqs" => self.mode = SchedulerMode::Mlfqs,
                    Some(opt) => return Err(ConfigError::UnknownOption(opt.as_ref().to_string())),
                    None => return Err(ConfigError::UnknownOption("-o".to_string())),
                },
                other => return Err(ConfigError::UnknownOption(other.to_string())),
            }
        }
        Ok(self)
    }
}

#[cold]
fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn env_number<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, &raw)),
        Err(_) => Ok(None),
    }
}
