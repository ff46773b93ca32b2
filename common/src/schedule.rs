use std::time::Duration;

use crate::{
    config::ActivityWindow,
    types::{WallClock, MINUTES_PER_DAY},
};

/// Minutes from the window start to `now`, wrapping over midnight.
fn minutes_since_start(now: &WallClock, window: &ActivityWindow) -> u32 {
    (now.minute_of_day() + MINUTES_PER_DAY - window.start_minute_of_day() % MINUTES_PER_DAY)
        % MINUTES_PER_DAY
}

pub fn should_enter_activity(now: &WallClock, window: &ActivityWindow) -> bool {
    minutes_since_start(now, window) < u32::from(window.duration_minutes)
}

/// Time until the next start of the window. Seconds are ignored, so a wake
/// can land up to 59 s after the start minute. When `now` sits exactly on
/// the start minute this is a full day: the result is always the next
/// occurrence, never the current one.
pub fn time_until_window(now: &WallClock, window: &ActivityWindow) -> Duration {
    let elapsed = minutes_since_start(now, window);
    let minutes_left = match elapsed {
        0 => MINUTES_PER_DAY,
        elapsed => MINUTES_PER_DAY - elapsed,
    };

    Duration::from_secs(u64::from(minutes_left) * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> WallClock {
        WallClock {
            year: 2026,
            month: 1,
            day: 5,
            hour,
            minute,
            second: 0,
        }
    }

    fn window(hour: u8, minute: u8, duration_minutes: u16) -> ActivityWindow {
        ActivityWindow {
            hour,
            minute,
            duration_minutes,
        }
    }

    fn every_minute() -> impl Iterator<Item = WallClock> {
        (0..MINUTES_PER_DAY).map(|minute| at(minute / 60, minute % 60))
    }

    #[test]
    fn sleeps_an_hour_before_window() {
        let now = at(6, 0);
        let window = window(7, 0, 10);

        assert!(!should_enter_activity(&now, &window));
        assert_eq!(time_until_window(&now, &window), Duration::from_secs(3_600));
    }

    #[test]
    fn enters_inside_window() {
        assert!(should_enter_activity(&at(7, 5), &window(7, 0, 10)));
        assert!(!should_enter_activity(&at(7, 10), &window(7, 0, 10)));
    }

    #[test]
    fn late_hour_wraps_a_full_day() {
        // 08:00 -> 07:00 tomorrow is 23h, not the 22h the +23 wrap produced.
        let sleep = time_until_window(&at(8, 0), &window(7, 0, 10));

        assert_eq!(sleep, Duration::from_secs(23 * 3_600));
    }

    #[test]
    fn minute_borrow_is_applied() {
        let sleep = time_until_window(&at(6, 30), &window(7, 0, 10));

        assert_eq!(sleep, Duration::from_secs(30 * 60));
    }

    #[test]
    fn after_activity_targets_next_day() {
        let sleep = time_until_window(&at(7, 10), &window(7, 0, 10));

        assert_eq!(sleep, Duration::from_secs((24 * 60 - 10) * 60));
    }

    #[test]
    fn window_is_open_for_exactly_its_duration() {
        for window in [
            window(7, 0, 10),
            window(7, 55, 10),
            window(23, 50, 30),
            window(0, 0, 1),
        ] {
            let open: Vec<u32> = every_minute()
                .filter(|now| should_enter_activity(now, &window))
                .map(|now| now.minute_of_day())
                .collect();

            assert_eq!(open.len(), usize::from(window.duration_minutes));

            let start = window.start_minute_of_day();
            for (offset, minute) in (0..).zip(sorted_from(open, start)) {
                assert_eq!(minute, (start + offset) % MINUTES_PER_DAY);
            }
        }
    }

    fn sorted_from(mut minutes: Vec<u32>, start: u32) -> Vec<u32> {
        minutes.sort_by_key(|minute| (minute + MINUTES_PER_DAY - start) % MINUTES_PER_DAY);
        minutes
    }

    #[test]
    fn outside_window_always_lands_on_start_minute() {
        for window in [window(7, 0, 10), window(0, 15, 45), window(23, 59, 5)] {
            for now in every_minute().filter(|now| !should_enter_activity(now, &window)) {
                let sleep_minutes = (time_until_window(&now, &window).as_secs() / 60) as u32;

                assert!(sleep_minutes > 0);
                assert_eq!(
                    (now.minute_of_day() + sleep_minutes) % MINUTES_PER_DAY,
                    window.start_minute_of_day(),
                    "from {now}"
                );
            }
        }
    }
}
