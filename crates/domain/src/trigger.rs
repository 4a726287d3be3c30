//! The condition that causes an integration's work to run.

use std::fmt;

use crate::schedule::CronSchedule;

/// What wakes an integration up.
///
/// Derived once from the capabilities an integration declares when it is
/// registered, then never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Fires on every tick of a cron schedule.
    Scheduled(CronSchedule),
    /// Fires on every message received on a topic filter.
    Subscribed(String),
    /// Fires on both.
    Both { schedule: CronSchedule, topic: String },
}

impl Trigger {
    /// Combine an optional schedule and an optional topic.
    ///
    /// Returns `None` when neither is present.
    #[must_use]
    pub fn from_parts(schedule: Option<CronSchedule>, topic: Option<String>) -> Option<Self> {
        match (schedule, topic) {
            (Some(schedule), Some(topic)) => Some(Self::Both { schedule, topic }),
            (Some(schedule), None) => Some(Self::Scheduled(schedule)),
            (None, Some(topic)) => Some(Self::Subscribed(topic)),
            (None, None) => None,
        }
    }

    #[must_use]
    pub fn schedule(&self) -> Option<&CronSchedule> {
        match self {
            Self::Scheduled(schedule) | Self::Both { schedule, .. } => Some(schedule),
            Self::Subscribed(_) => None,
        }
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::Subscribed(topic) | Self::Both { topic, .. } => Some(topic),
            Self::Scheduled(_) => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled(schedule) => write!(f, "cron({schedule})"),
            Self::Subscribed(topic) => write!(f, "topic({topic})"),
            Self::Both { schedule, topic } => write!(f, "cron({schedule}) + topic({topic})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly() -> CronSchedule {
        CronSchedule::parse("0 * * * *").unwrap()
    }

    #[test]
    fn should_build_both_when_schedule_and_topic_given() {
        let trigger = Trigger::from_parts(Some(hourly()), Some("a/b".to_string())).unwrap();
        assert_eq!(trigger.schedule(), Some(&hourly()));
        assert_eq!(trigger.topic(), Some("a/b"));
    }

    #[test]
    fn should_build_nothing_without_parts() {
        assert!(Trigger::from_parts(None, None).is_none());
    }

    #[test]
    fn should_expose_only_schedule_for_scheduled_trigger() {
        let trigger = Trigger::Scheduled(hourly());
        assert!(trigger.topic().is_none());
        assert_eq!(trigger.to_string(), "cron(0 * * * *)");
    }

    #[test]
    fn should_expose_only_topic_for_subscribed_trigger() {
        let trigger = Trigger::Subscribed("door/command".to_string());
        assert!(trigger.schedule().is_none());
        assert_eq!(trigger.to_string(), "topic(door/command)");
    }
}
