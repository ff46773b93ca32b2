use chrono::Utc;
use chrono_tz::Tz;

use rainlight_common::{ClockError, WallClock};

/// System clock read through an IANA timezone.
#[derive(Debug, Clone, Copy)]
pub struct ZonedClock {
    tz: Tz,
}

impl Default for ZonedClock {
    fn default() -> Self {
        Self {
            tz: chrono_tz::Europe::Madrid,
        }
    }
}

impl ZonedClock {
    pub fn now(&self) -> WallClock {
        WallClock::from_civil(&Utc::now().with_timezone(&self.tz))
    }

    pub fn set_timezone(&mut self, timezone: &str) -> Result<(), ClockError> {
        self.tz = timezone
            .parse()
            .map_err(|_| ClockError::UnknownTimezone(timezone.to_string()))?;
        Ok(())
    }
}
