use crate::orchestrator::Orchestrator;
use crate::timer::Pacer;
use chrono::{Days, Local, NaiveDateTime, NaiveTime};
use llm_interface::LlmProvider;
use tracing::{error, info, warn};
use trendcaster_core::{CoreError, ErrorExt, Settings};
use x_client::SocialPlatform;

/// The earliest trigger strictly after `now`: a time later today, otherwise
/// the earliest time tomorrow. `None` without any trigger times.
pub fn next_trigger(now: NaiveDateTime, times: &[NaiveTime]) -> Option<NaiveDateTime> {
    let today = now.date();

    if let Some(later_today) = times.iter().filter(|t| **t > now.time()).min() {
        return Some(today.and_time(*later_today));
    }

    let earliest = times.iter().min()?;
    let tomorrow = today.checked_add_days(Days::new(1))?;
    Some(tomorrow.and_time(*earliest))
}

/// Triggers strictly after `after` that are already due at `now`
pub fn missed_triggers(
    after: NaiveDateTime,
    now: NaiveDateTime,
    times: &[NaiveTime],
) -> Vec<NaiveDateTime> {
    let mut missed = Vec::new();
    let mut cursor = after;
    while let Some(trigger) = next_trigger(cursor, times) {
        if trigger > now {
            break;
        }
        missed.push(trigger);
        cursor = trigger;
    }
    missed
}

/// Runs the pipeline at fixed local times every day until stopped
#[derive(Debug)]
pub struct BackgroundService {
    times: Vec<NaiveTime>,
    pacer: Pacer,
}

impl BackgroundService {
    pub fn new(times: Vec<NaiveTime>, pacer: Pacer) -> Self {
        Self { times, pacer }
    }

    pub fn from_settings(settings: &Settings, pacer: Pacer) -> Result<Self, CoreError> {
        Ok(Self::new(settings.schedule_times()?, pacer))
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub async fn start<L, P>(&self, orchestrator: &Orchestrator<L, P>) -> Result<(), CoreError>
    where
        L: LlmProvider,
        P: SocialPlatform,
    {
        let schedule: Vec<String> = self
            .times
            .iter()
            .map(|t| t.format("%H:%M").to_string())
            .collect();
        info!("Scheduler started, daily runs at {}", schedule.join(", "));

        orchestrator.load_previous_performance().await;

        loop {
            let now = Local::now().naive_local();
            let next = next_trigger(now, &self.times).ok_or_else(|| CoreError::InvalidInput {
                message: "no trigger times configured".to_string(),
            })?;
            let wait = (next - now).to_std().unwrap_or_default();
            info!("Next run at {}", next.format("%Y-%m-%d %H:%M"));

            if self.pacer.wait(wait).await.is_err() {
                info!("Scheduler stopped");
                return Ok(());
            }

            info!("Running scheduled cycle");
            match orchestrator.run_cycle().await {
                Ok(summary) => info!(
                    "Scheduled run completed with {} posts",
                    summary.posts_published.len()
                ),
                Err(CoreError::Cancelled) => {
                    info!("Scheduled run cancelled, scheduler stopped");
                    return Ok(());
                }
                Err(e) => {
                    error!("Scheduled run failed");
                    e.log_error();
                }
            }

            for trigger in missed_triggers(next, Local::now().naive_local(), &self.times) {
                warn!(
                    "Skipped the {} run, the previous cycle was still in progress",
                    trigger.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    pub fn stop(&self) {
        info!("Stopping scheduler");
        self.pacer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn default_times() -> Vec<NaiveTime> {
        Settings::default().schedule_times().unwrap()
    }

    #[test]
    fn test_next_trigger_later_today() {
        assert_eq!(next_trigger(at(1, 8, 0), &default_times()), Some(at(1, 9, 0)));
        assert_eq!(next_trigger(at(1, 9, 30), &default_times()), Some(at(1, 14, 0)));
    }

    #[test]
    fn test_next_trigger_is_strictly_after_now() {
        assert_eq!(next_trigger(at(1, 14, 0), &default_times()), Some(at(1, 19, 0)));
    }

    #[test]
    fn test_next_trigger_rolls_over() {
        assert_eq!(next_trigger(at(1, 19, 0), &default_times()), Some(at(2, 9, 0)));
        assert_eq!(
            next_trigger(at(31, 23, 59), &default_times()).unwrap().date(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_next_trigger_unsorted_times() {
        let times = vec![
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        ];
        assert_eq!(next_trigger(at(1, 10, 0), &times), Some(at(1, 19, 0)));
        assert_eq!(next_trigger(at(1, 20, 0), &times), Some(at(2, 9, 0)));
    }

    #[test]
    fn test_missed_triggers() {
        let times = default_times();
        assert!(missed_triggers(at(1, 9, 0), at(1, 10, 0), &times).is_empty());
        assert_eq!(
            missed_triggers(at(1, 9, 0), at(1, 14, 0), &times),
            vec![at(1, 14, 0)]
        );
        assert_eq!(
            missed_triggers(at(1, 9, 0), at(2, 9, 30), &times),
            vec![at(1, 14, 0), at(1, 19, 0), at(2, 9, 0)]
        );
        assert!(missed_triggers(at(1, 9, 0), at(1, 20, 0), &[]).is_empty());
    }

    #[test]
    fn test_no_times() {
        assert_eq!(next_trigger(at(1, 10, 0), &[]), None);
    }
}
